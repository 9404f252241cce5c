//! Order flow enrichment and multi-resolution zone tracking.
//!
//! Holds a read-only capability over [`crate::orderbook::OrderBookState`]
//! (an `Arc`, never a back-reference from the book): the book has no
//! knowledge that zones exist, matching this spec's note that cyclic
//! book/preprocessor references must be modeled as a one-way read.

pub mod zone;

use crate::config::ZoneConfig;
use crate::errors::{ParseError, PreprocessorError};
use crate::fixed_point::{parse_price, parse_qty, Qty, Ticks};
use crate::orderbook::OrderBookState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use zone::{find_most_relevant_zone, ZoneResolution, ZoneSnapshot};

/// One trade from the aggregated-trade stream, already at the ingress
/// boundary where decimal strings become fixed-point values.
#[derive(Debug, Clone)]
pub struct AggTrade {
    pub trade_id: u64,
    pub price: Ticks,
    pub quantity: Qty,
    pub timestamp: Instant,
    pub buyer_is_maker: bool,
}

impl AggTrade {
    pub fn parse(
        trade_id: u64,
        price: &str,
        quantity: &str,
        price_precision: u32,
        buyer_is_maker: bool,
        timestamp: Instant,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            trade_id,
            price: parse_price(price, price_precision)?,
            quantity: parse_qty(quantity)?,
            timestamp,
            buyer_is_maker,
        })
    }

    /// `buyerIsMaker = true` means the seller was the taker: aggressive sell.
    pub fn is_aggressive_buy(&self) -> bool {
        !self.buyer_is_maker
    }
}

#[derive(Debug, Clone)]
pub struct StandardZoneData {
    pub zones_5_tick: Vec<ZoneSnapshot>,
    pub zones_10_tick: Vec<ZoneSnapshot>,
    pub zones_20_tick: Vec<ZoneSnapshot>,
    pub base_ticks: [u32; 3],
    pub time_window: Duration,
}

#[derive(Debug, Clone)]
pub struct EnrichedTrade {
    pub trade_id: u64,
    pub price: Ticks,
    pub quantity: Qty,
    pub quote_quantity: f64,
    pub timestamp: Instant,
    pub buyer_is_maker: bool,
    pub passive_bid_volume: Qty,
    pub passive_ask_volume: Qty,
    pub zone_passive_bid_volume: Qty,
    pub zone_passive_ask_volume: Qty,
    pub best_bid: Option<Ticks>,
    pub best_ask: Option<Ticks>,
    /// `None` only while the preprocessor (equivalently, the book) has not
    /// yet produced its first zone update.
    pub zone_data: Option<StandardZoneData>,
}

/// Enriches trades with passive-liquidity context and maintains the three
/// zone resolutions (5, 10, 20 ticks).
pub struct OrderFlowPreprocessor {
    book: Arc<OrderBookState>,
    config: ZoneConfig,
    zone_5: ZoneResolution,
    zone_10: ZoneResolution,
    zone_20: ZoneResolution,
}

impl OrderFlowPreprocessor {
    pub fn new(book: Arc<OrderBookState>, config: ZoneConfig) -> Self {
        let window = Duration::from_secs(config.time_window_secs);
        let [r5, r10, r20] = config.base_ticks;
        Self {
            zone_5: ZoneResolution::new(r5, window),
            zone_10: ZoneResolution::new(r10, window),
            zone_20: ZoneResolution::new(r20, window),
            book,
            config,
        }
    }

    /// Run one trade through the enrichment pipeline.
    pub fn process_trade(&mut self, trade: &AggTrade) -> Result<EnrichedTrade, PreprocessorError> {
        let best_bid = self.book.get_best_bid();
        let best_ask = self.book.get_best_ask();

        let is_aggressive_buy = trade.is_aggressive_buy();

        let level = self.book.get_level(trade.price);
        let (passive_bid_volume, passive_ask_volume) = level
            .map(|l| (l.bid_qty, l.ask_qty))
            .unwrap_or((Qty::ZERO, Qty::ZERO));

        let band = self.book.sum_band(trade.price, self.config.zone_band_ticks);

        let now = trade.timestamp;
        for resolution in [&mut self.zone_5, &mut self.zone_10, &mut self.zone_20] {
            resolution.record_trade(
                trade.price,
                trade.quantity,
                is_aggressive_buy,
                passive_bid_volume,
                passive_ask_volume,
                now,
            );
        }

        let zone_data = Some(StandardZoneData {
            zones_5_tick: self.zone_5.nearest(trade.price, self.config.max_zones_per_resolution),
            zones_10_tick: self.zone_10.nearest(trade.price, self.config.max_zones_per_resolution),
            zones_20_tick: self.zone_20.nearest(trade.price, self.config.max_zones_per_resolution),
            base_ticks: self.config.base_ticks,
            time_window: Duration::from_secs(self.config.time_window_secs),
        });

        Ok(EnrichedTrade {
            trade_id: trade.trade_id,
            price: trade.price,
            quantity: trade.quantity,
            quote_quantity: trade.price.to_decimal(self.book.config().price_precision)
                * trade.quantity.to_decimal(),
            timestamp: trade.timestamp,
            buyer_is_maker: trade.buyer_is_maker,
            passive_bid_volume,
            passive_ask_volume,
            zone_passive_bid_volume: band.bid_qty,
            zone_passive_ask_volume: band.ask_qty,
            best_bid,
            best_ask,
            zone_data,
        })
    }

    /// Ranks zones at the given resolution's bucket around `price`.
    pub fn find_most_relevant_zone(&self, resolution: u32, price: Ticks) -> Option<ZoneSnapshot> {
        let zones = match resolution {
            r if r == self.zone_5.resolution => &self.zone_5.zones,
            r if r == self.zone_10.resolution => &self.zone_10.zones,
            r if r == self.zone_20.resolution => &self.zone_20.zones,
            _ => return None,
        };
        find_most_relevant_zone(zones.values(), price, &self.config).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrderBookConfig;
    use crate::orderbook::RestSnapshot;
    use proptest::prelude::*;

    fn book_with_absorption_setup() -> Arc<OrderBookState> {
        let book = OrderBookState::new(OrderBookConfig {
            price_precision: 2,
            ..Default::default()
        });
        book.load_snapshot(RestSnapshot {
            last_update_id: 1,
            bids: vec![("89.00".into(), "600".into())],
            asks: vec![("89.01".into(), "50".into())],
        })
        .unwrap();
        Arc::new(book)
    }

    #[test]
    fn classic_absorption_setup_counts_as_aggressive_sell() {
        let book = book_with_absorption_setup();
        let mut pre = OrderFlowPreprocessor::new(book, ZoneConfig::default());

        let now = Instant::now();
        for i in 0..20u64 {
            let trade = AggTrade::parse(i, "89.00", "10", 2, true, now).unwrap();
            pre.process_trade(&trade).unwrap();
        }

        let zone = pre.find_most_relevant_zone(5, Ticks(8900)).unwrap();
        assert_eq!(zone.aggressive_sell_volume, Qty(200_000_000_000));
        assert_eq!(zone.aggressive_buy_volume, Qty::ZERO);
        assert_eq!(zone.trade_count, 20);
    }

    #[test]
    fn enriched_trade_carries_best_quotes() {
        let book = book_with_absorption_setup();
        let mut pre = OrderFlowPreprocessor::new(book, ZoneConfig::default());
        let trade = AggTrade::parse(1, "89.00", "1", 2, false, Instant::now()).unwrap();
        let enriched = pre.process_trade(&trade).unwrap();
        assert_eq!(enriched.best_bid, Some(Ticks(8900)));
        assert_eq!(enriched.best_ask, Some(Ticks(8901)));
        assert!(enriched.zone_data.is_some());
    }

    proptest! {
        /// Invariant: every trade fed to `process_trade` produces exactly
        /// one enriched trade carrying that trade's own id — no drops, no
        /// duplicates, regardless of price or side.
        #[test]
        fn one_trade_in_yields_one_enriched_trade_out(
            qty in 1i64..100_000i64,
            aggressive_buy in any::<bool>(),
            price_offset in 0i64..20i64,
        ) {
            let book = book_with_absorption_setup();
            let mut pre = OrderFlowPreprocessor::new(book, ZoneConfig::default());
            let now = Instant::now();

            let mut seen_ids = Vec::new();
            for trade_id in 0..10u64 {
                let price = Ticks(8900 + price_offset).to_decimal(2);
                let trade = AggTrade::parse(
                    trade_id,
                    &format!("{:.2}", price),
                    &qty.to_string(),
                    2,
                    !aggressive_buy,
                    now,
                ).unwrap();
                let enriched = pre.process_trade(&trade).unwrap();
                prop_assert_eq!(enriched.trade_id, trade_id);
                seen_ids.push(enriched.trade_id);
            }
            prop_assert_eq!(seen_ids, (0..10u64).collect::<Vec<_>>());
        }
    }
}

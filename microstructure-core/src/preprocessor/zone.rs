//! Multi-resolution tick zones.
//!
//! Each zone aggregates aggressive and passive volume over a rolling time
//! window. Storage mirrors `OrderBookState`: a `BTreeMap<Ticks, ZoneSnapshot>`
//! per resolution, keyed by the zone's anchor price, so neighboring-zone
//! lookups for `StandardZoneData` are an ordinary range query.

use crate::config::ZoneConfig;
use crate::fixed_point::{Qty, Ticks};
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZoneBoundaries {
    pub min: Ticks,
    pub max: Ticks,
}

/// One contributing trade, retained only so it can be evicted once it ages
/// out of the rolling window.
#[derive(Debug, Clone, Copy)]
struct Contribution {
    time: Instant,
    qty: Qty,
    price: Ticks,
    is_aggressive_buy: bool,
}

#[derive(Debug, Clone)]
pub struct ZoneSnapshot {
    pub zone_id: String,
    pub price_level: Ticks,
    pub resolution: u32,
    pub aggressive_volume: Qty,
    pub aggressive_buy_volume: Qty,
    pub aggressive_sell_volume: Qty,
    pub passive_volume: Qty,
    pub passive_bid_volume: Qty,
    pub passive_ask_volume: Qty,
    pub trade_count: u64,
    pub boundaries: ZoneBoundaries,
    pub last_update: Instant,
    pub first_trade_time: Instant,
    pub volume_weighted_price: f64,
    contributions: VecDeque<Contribution>,
    /// Running sum of `price * qty` over `contributions`, for O(1) VWAP maintenance.
    weighted_sum: f64,
}

impl ZoneSnapshot {
    fn new(anchor: Ticks, resolution: u32, now: Instant) -> Self {
        Self {
            zone_id: format!("{}t@{}", resolution, anchor.0),
            price_level: anchor,
            resolution,
            aggressive_volume: Qty::ZERO,
            aggressive_buy_volume: Qty::ZERO,
            aggressive_sell_volume: Qty::ZERO,
            passive_volume: Qty::ZERO,
            passive_bid_volume: Qty::ZERO,
            passive_ask_volume: Qty::ZERO,
            trade_count: 0,
            boundaries: ZoneBoundaries {
                min: anchor,
                max: Ticks(anchor.0 + resolution as i64),
            },
            last_update: now,
            first_trade_time: now,
            volume_weighted_price: anchor.0 as f64,
            contributions: VecDeque::new(),
            weighted_sum: 0.0,
        }
    }

    pub fn timespan(&self) -> Duration {
        self.last_update.saturating_duration_since(self.first_trade_time)
    }

    pub fn passive_ratio(&self) -> f64 {
        let total = self.passive_volume.0 + self.aggressive_volume.0;
        if total == 0 {
            0.0
        } else {
            self.passive_volume.0 as f64 / total as f64
        }
    }

    fn apply_trade(&mut self, price: Ticks, qty: Qty, is_aggressive_buy: bool, now: Instant) {
        self.aggressive_volume = self.aggressive_volume.saturating_add(qty);
        if is_aggressive_buy {
            self.aggressive_buy_volume = self.aggressive_buy_volume.saturating_add(qty);
        } else {
            self.aggressive_sell_volume = self.aggressive_sell_volume.saturating_add(qty);
        }
        self.trade_count += 1;
        self.weighted_sum += price.0 as f64 * qty.to_decimal();
        self.last_update = now;
        self.contributions.push_back(Contribution {
            time: now,
            qty,
            price,
            is_aggressive_buy,
        });
        self.recompute_vwap();
    }

    fn recompute_vwap(&mut self) {
        let total = self.aggressive_volume.to_decimal();
        if total > 0.0 {
            self.volume_weighted_price = self.weighted_sum / total;
        }
    }

    fn refresh_passive(&mut self, passive_bid: Qty, passive_ask: Qty) {
        self.passive_bid_volume = passive_bid;
        self.passive_ask_volume = passive_ask;
        self.passive_volume = passive_bid.saturating_add(passive_ask);
    }

    /// Evict contributions older than `window`. Returns true if the zone is
    /// now empty and should be dropped.
    fn evict(&mut self, now: Instant, window: Duration) -> bool {
        while let Some(front) = self.contributions.front() {
            if now.saturating_duration_since(front.time) > window {
                let gone = self.contributions.pop_front().unwrap();
                self.aggressive_volume = Qty(self.aggressive_volume.0 - gone.qty.0);
                if gone.is_aggressive_buy {
                    self.aggressive_buy_volume = Qty(self.aggressive_buy_volume.0 - gone.qty.0);
                } else {
                    self.aggressive_sell_volume = Qty(self.aggressive_sell_volume.0 - gone.qty.0);
                }
                self.weighted_sum -= gone.price.0 as f64 * gone.qty.to_decimal();
                self.trade_count = self.trade_count.saturating_sub(1);
            } else {
                break;
            }
        }
        if let Some(front) = self.contributions.front() {
            self.first_trade_time = front.time;
            self.recompute_vwap();
            false
        } else {
            true
        }
    }
}

/// All zones at one resolution, plus the eviction window they share.
pub struct ZoneResolution {
    pub resolution: u32,
    pub zones: BTreeMap<Ticks, ZoneSnapshot>,
    window: Duration,
}

impl ZoneResolution {
    pub fn new(resolution: u32, window: Duration) -> Self {
        Self {
            resolution,
            zones: BTreeMap::new(),
            window,
        }
    }

    /// Update (creating if absent) the zone touched by one trade, then evict
    /// stale contributions from every tracked zone.
    pub fn record_trade(
        &mut self,
        trade_price: Ticks,
        qty: Qty,
        is_aggressive_buy: bool,
        passive_bid: Qty,
        passive_ask: Qty,
        now: Instant,
    ) -> Ticks {
        let anchor = trade_price.floor_to(self.resolution);
        let zone = self
            .zones
            .entry(anchor)
            .or_insert_with(|| ZoneSnapshot::new(anchor, self.resolution, now));
        zone.apply_trade(trade_price, qty, is_aggressive_buy, now);
        zone.refresh_passive(passive_bid, passive_ask);

        let window = self.window;
        self.zones.retain(|_, z| !z.evict(now, window));
        anchor
    }

    /// The nearest `k` zones to `price`, sorted by distance, for the egress payload.
    pub fn nearest(&self, price: Ticks, k: usize) -> Vec<ZoneSnapshot> {
        let mut zones: Vec<&ZoneSnapshot> = self.zones.values().collect();
        zones.sort_by_key(|z| z.price_level.abs_diff(price));
        zones.into_iter().take(k).cloned().collect()
    }
}

/// Rank zone candidates by a weighted sum of inverse tick distance, normalized
/// volume, and passive/aggressive ratio. Ties break on most recent `last_update`.
pub fn find_most_relevant_zone<'a>(
    zones: impl IntoIterator<Item = &'a ZoneSnapshot>,
    price: Ticks,
    config: &ZoneConfig,
) -> Option<&'a ZoneSnapshot> {
    let zones: Vec<&ZoneSnapshot> = zones.into_iter().collect();
    if zones.is_empty() {
        return None;
    }
    let max_volume = zones
        .iter()
        .map(|z| z.aggressive_volume.to_decimal())
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);

    let w = &config.relevance_weights;
    let mut best: Option<(&ZoneSnapshot, f64)> = None;
    for zone in zones {
        let distance = zone.price_level.abs_diff(price) as f64;
        let inverse_distance = 1.0 / (1.0 + distance);
        let normalized_volume = zone.aggressive_volume.to_decimal() / max_volume;
        let score = w.tick_distance * inverse_distance
            + w.volume * normalized_volume
            + w.passive_ratio * zone.passive_ratio();
        match best {
            Some((current, current_score)) => {
                if score > current_score
                    || (score == current_score && zone.last_update > current.last_update)
                {
                    best = Some((zone, score));
                }
            }
            None => best = Some((zone, score)),
        }
    }
    best.map(|(z, _)| z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_trade_and_classifies_sides() {
        let mut res = ZoneResolution::new(5, Duration::from_secs(60));
        let now = Instant::now();
        res.record_trade(Ticks(8900), Qty(1_000_000_000), false, Qty::ZERO, Qty(400_000_000_000), now);
        let zone = res.zones.get(&Ticks(8900)).unwrap();
        assert_eq!(zone.aggressive_sell_volume, Qty(1_000_000_000));
        assert_eq!(zone.aggressive_buy_volume, Qty::ZERO);
        assert_eq!(zone.trade_count, 1);
    }

    #[test]
    fn evicts_stale_contributions() {
        let mut res = ZoneResolution::new(5, Duration::from_millis(10));
        let now = Instant::now();
        res.record_trade(Ticks(8900), Qty(1_000_000_000), true, Qty::ZERO, Qty::ZERO, now);
        std::thread::sleep(Duration::from_millis(20));
        let later = Instant::now();
        res.record_trade(Ticks(8901), Qty(1_000_000_000), true, Qty::ZERO, Qty::ZERO, later);
        assert!(res.zones.get(&Ticks(8900)).is_none());
    }

    #[test]
    fn aggressive_buy_plus_sell_equals_total() {
        let mut res = ZoneResolution::new(10, Duration::from_secs(60));
        let now = Instant::now();
        res.record_trade(Ticks(100), Qty(3_000_000_000), true, Qty::ZERO, Qty::ZERO, now);
        res.record_trade(Ticks(101), Qty(2_000_000_000), false, Qty::ZERO, Qty::ZERO, now);
        let zone = res.zones.get(&Ticks(100)).unwrap();
        assert_eq!(
            zone.aggressive_buy_volume.0 + zone.aggressive_sell_volume.0,
            zone.aggressive_volume.0
        );
    }
}

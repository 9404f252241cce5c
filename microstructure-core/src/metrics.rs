//! Prometheus metrics for the three subsystems.
//!
//! One registry, one struct per subsystem, each registered once at
//! construction and shared via `Arc` — the same shape as the teacher's
//! `MetricsRegistry`/`TradingMetrics` split, generalized from
//! order-execution concerns to order-book / preprocessor / ledger concerns.

use prometheus::{Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct CoreMetrics {
    registry: Arc<Registry>,
    order_book: Arc<OrderBookMetrics>,
    preprocessor: Arc<PreprocessorMetrics>,
    ledger: Arc<LedgerMetrics>,
}

impl CoreMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());
        let order_book = Arc::new(OrderBookMetrics::new(&registry)?);
        let preprocessor = Arc::new(PreprocessorMetrics::new(&registry)?);
        let ledger = Arc::new(LedgerMetrics::new(&registry)?);

        info!("microstructure metrics registry initialized");

        Ok(Self {
            registry,
            order_book,
            preprocessor,
            ledger,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn order_book(&self) -> &OrderBookMetrics {
        &self.order_book
    }

    pub fn preprocessor(&self) -> &PreprocessorMetrics {
        &self.preprocessor
    }

    pub fn ledger(&self) -> &LedgerMetrics {
        &self.ledger
    }
}

impl Default for CoreMetrics {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::error!("failed to create metrics registry: {}", e);
            panic!("cannot create metrics registry")
        })
    }
}

pub struct OrderBookMetrics {
    pub diffs_applied_total: IntCounter,
    pub sequence_gaps_total: IntCounter,
    pub parse_errors_total: IntCounter,
    pub circuit_open_rejections_total: IntCounter,
    pub book_size: IntGauge,
    pub spread_ticks: Gauge,
    pub mid_price: Gauge,
}

impl OrderBookMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let diffs_applied_total = IntCounter::new(
            "microstructure_orderbook_diffs_applied_total",
            "Total depth diffs applied",
        )?;
        registry.register(Box::new(diffs_applied_total.clone()))?;

        let sequence_gaps_total = IntCounter::new(
            "microstructure_orderbook_sequence_gaps_total",
            "Total sequence gaps detected",
        )?;
        registry.register(Box::new(sequence_gaps_total.clone()))?;

        let parse_errors_total = IntCounter::new(
            "microstructure_orderbook_parse_errors_total",
            "Total malformed diff entries dropped",
        )?;
        registry.register(Box::new(parse_errors_total.clone()))?;

        let circuit_open_rejections_total = IntCounter::new(
            "microstructure_orderbook_circuit_open_rejections_total",
            "Total updates rejected while the circuit breaker was open",
        )?;
        registry.register(Box::new(circuit_open_rejections_total.clone()))?;

        let book_size = IntGauge::new("microstructure_orderbook_size", "Current number of price levels")?;
        registry.register(Box::new(book_size.clone()))?;

        let spread_ticks = Gauge::new("microstructure_orderbook_spread_ticks", "Current bid/ask spread in ticks")?;
        registry.register(Box::new(spread_ticks.clone()))?;

        let mid_price = Gauge::new("microstructure_orderbook_mid_price", "Current mid price in ticks")?;
        registry.register(Box::new(mid_price.clone()))?;

        Ok(Self {
            diffs_applied_total,
            sequence_gaps_total,
            parse_errors_total,
            circuit_open_rejections_total,
            book_size,
            spread_ticks,
            mid_price,
        })
    }
}

pub struct PreprocessorMetrics {
    pub trades_enriched_total: IntCounter,
    pub zones_active: IntGauge,
    pub enrichment_latency_us: Histogram,
}

impl PreprocessorMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let trades_enriched_total = IntCounter::new(
            "microstructure_preprocessor_trades_enriched_total",
            "Total trades enriched",
        )?;
        registry.register(Box::new(trades_enriched_total.clone()))?;

        let zones_active = IntGauge::new(
            "microstructure_preprocessor_zones_active",
            "Total live zones across all resolutions",
        )?;
        registry.register(Box::new(zones_active.clone()))?;

        let enrichment_latency_us = Histogram::with_opts(
            HistogramOpts::new(
                "microstructure_preprocessor_enrichment_latency_us",
                "Per-trade enrichment latency in microseconds",
            )
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
        )?;
        registry.register(Box::new(enrichment_latency_us.clone()))?;

        Ok(Self {
            trades_enriched_total,
            zones_active,
            enrichment_latency_us,
        })
    }
}

pub struct LedgerMetrics {
    pub signals_submitted_total: IntCounter,
    pub rejections_submitted_total: IntCounter,
    pub outcomes_total: IntCounterVec,
    pub missed_opportunities_total: IntCounter,
    pub pending_records: IntGauge,
}

impl LedgerMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let signals_submitted_total = IntCounter::new(
            "microstructure_ledger_signals_submitted_total",
            "Total signals submitted for validation",
        )?;
        registry.register(Box::new(signals_submitted_total.clone()))?;

        let rejections_submitted_total = IntCounter::new(
            "microstructure_ledger_rejections_submitted_total",
            "Total rejections submitted for validation",
        )?;
        registry.register(Box::new(rejections_submitted_total.clone()))?;

        let outcomes_total = IntCounterVec::new(
            Opts::new("microstructure_ledger_outcomes_total", "Total finalized outcomes by status"),
            &["status"],
        )?;
        registry.register(Box::new(outcomes_total.clone()))?;

        let missed_opportunities_total = IntCounter::new(
            "microstructure_ledger_missed_opportunities_total",
            "Total rejected signals that would have hit take-profit",
        )?;
        registry.register(Box::new(missed_opportunities_total.clone()))?;

        let pending_records = IntGauge::new(
            "microstructure_ledger_pending_records",
            "Total signals/rejections awaiting classification",
        )?;
        registry.register(Box::new(pending_records.clone()))?;

        Ok(Self {
            signals_submitted_total,
            rejections_submitted_total,
            outcomes_total,
            missed_opportunities_total,
            pending_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_all_subsystem_metrics() {
        let metrics = CoreMetrics::new().unwrap();
        metrics.order_book().diffs_applied_total.inc();
        metrics.preprocessor().trades_enriched_total.inc();
        metrics.ledger().outcomes_total.with_label_values(&["tp"]).inc();
        assert!(!metrics.registry().gather().is_empty());
    }
}

//! Standalone demo wiring the three microstructure subsystems against a
//! mock feed — no real exchange connection. Useful as a smoke test and as a
//! reference for how a real binary would assemble the pieces.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use microstructure_core::logging::init_logger;
use microstructure_core::metrics::CoreMetrics;
use microstructure_core::metrics_server::{MetricsServer, MetricsServerConfig};
use microstructure_core::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// Fixed snapshot for the demo; a real binary would hit the REST endpoint here.
struct MockSnapshotSource;

#[async_trait]
impl SnapshotSource for MockSnapshotSource {
    async fn fetch_snapshot(&self) -> Result<RestSnapshot, OrderBookError> {
        Ok(RestSnapshot {
            last_update_id: 100,
            bids: vec![("89.00".to_string(), "600".to_string())],
            asks: vec![("89.01".to_string(), "50".to_string())],
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger("info", false);
    tracing::info!("=== Microstructure Core Demo ===");

    let config = MicrostructureConfig::default();
    let metrics = Arc::new(CoreMetrics::new()?);
    let metrics_server = MetricsServer::new(MetricsServerConfig::default(), metrics.clone());
    tokio::spawn(async move {
        if let Err(e) = metrics_server.serve().await {
            tracing::error!("metrics server stopped: {}", e);
        }
    });

    let book = Arc::new(
        OrderBookState::new(config.order_book.clone()).with_snapshot_source(Arc::new(MockSnapshotSource)),
    );
    book.initialize().await?;
    tracing::info!("order book initialized: {:?}", book.get_health());

    let mut preprocessor = OrderFlowPreprocessor::new(book.clone(), config.zones.clone());
    let ledger = Arc::new(SignalValidationLedger::new(config.validation.clone()));

    let maintenance = spawn_maintenance_tasks(
        book.clone(),
        ledger.clone(),
        std::time::Duration::from_secs(config.validation.flush_interval_secs),
    );

    // Classic absorption setup: 20 trades at the bid, buyerIsMaker=true
    // (seller is the taker -> aggressive sell).
    for i in 0..20u64 {
        let trade = AggTrade::parse(i, "89.00", "10", config.order_book.price_precision, true, Instant::now())?;
        let enriched = preprocessor.process_trade(&trade)?;
        metrics.preprocessor().trades_enriched_total.inc();
        ledger.update_current_price(enriched.price.to_decimal(config.order_book.price_precision), Utc::now());
    }

    metrics.ledger().signals_submitted_total.inc();
    ledger.submit_signal(SignalCandidate {
        signal_id: 1,
        side: Side::Sell,
        price: 89.00,
        timestamp: Utc::now(),
        confidence: 0.82,
        threshold_checks: ThresholdChecks::Absorption {
            absorption_ratio: 0.9,
            passive_volume: 600.0,
            aggressive_volume: 200.0,
        },
    });

    let diff = DepthDiff {
        first_update_id: 101,
        final_update_id: 101,
        bids: vec![("89.02".to_string(), "5".to_string())],
        asks: vec![],
    };
    book.update_depth(diff)?;
    metrics.order_book().diffs_applied_total.inc();

    let depth_metrics = book.get_depth_metrics();
    metrics
        .order_book()
        .book_size
        .set((depth_metrics.bid_levels + depth_metrics.ask_levels) as i64);
    metrics.order_book().mid_price.set(book.get_mid_price());
    tracing::info!("depth metrics: {:?}", depth_metrics);
    tracing::info!("demo complete");

    maintenance.shutdown().await;
    ledger.shutdown();
    Ok(())
}

//! Periodic background tasks: book pruning, the health watchdog, and the
//! ledger's timer-wheel drain / flush.
//!
//! Grounded on the `tokio::time::interval` + `MissedTickBehavior::Skip`
//! pattern used throughout the corpus's own polling loops (e.g.
//! `cooprefr-bettersys/rust-backend/src/vault/engine.rs`'s long-poll and
//! `updown_poll` loops). Each task owns one `Arc` handle and checks a
//! shared `AtomicBool` flag once per tick, so `shutdown()` can stop all of
//! them together without tracking per-task cancellation channels.

use crate::ledger::SignalValidationLedger;
use crate::orderbook::OrderBookState;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Cooperative stop flag shared by every maintenance task spawned from one
/// [`MaintenanceHandles`]. Cheaper than per-task cancellation channels for a
/// fixed, small set of tasks that all shut down together.
#[derive(Clone, Default)]
struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    fn should_stop(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Handles to the background tasks spawned by [`spawn_maintenance_tasks`].
/// Dropping this without calling `shutdown` leaves the tasks running
/// detached; call `shutdown` (or `shutdown().await`) to stop them cleanly.
pub struct MaintenanceHandles {
    flag: ShutdownFlag,
    prune: JoinHandle<()>,
    watchdog: JoinHandle<()>,
    validation: JoinHandle<()>,
}

impl MaintenanceHandles {
    /// Signal all tasks to stop after their current tick and wait for them
    /// to finish. Mirrors `SignalValidationLedger::shutdown`'s "cancel
    /// timers, flush buffers" sequence at the task level.
    pub async fn shutdown(self) {
        self.flag.trigger();
        let _ = tokio::join!(self.prune, self.watchdog, self.validation);
        info!("maintenance tasks stopped");
    }
}

/// Spawn the three timer-driven maintenance tasks this spec requires:
/// book pruning (`pruneIntervalMs`), the health watchdog (10s cadence,
/// triggers `recover()` when stale), and the ledger's due-check drain plus
/// periodic flush. None of these tasks sit on the trade hot path.
pub fn spawn_maintenance_tasks(
    book: Arc<OrderBookState>,
    ledger: Arc<SignalValidationLedger>,
    flush_interval: Duration,
) -> MaintenanceHandles {
    let flag = ShutdownFlag::default();

    let prune = {
        let book = book.clone();
        let flag = flag.clone();
        let period = Duration::from_millis(book.config().prune_interval_ms.max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if flag.should_stop() {
                    break;
                }
                book.prune();
            }
        })
    };

    let watchdog = {
        let book = book.clone();
        let flag = flag.clone();
        let period = Duration::from_secs(book.config().health_check_interval_secs.max(1));
        let stale_threshold_ms = book.config().health_stale_threshold_secs * 1_000;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if flag.should_stop() {
                    break;
                }
                let health = book.get_health();
                if health.initialized && health.last_update_ms > stale_threshold_ms {
                    warn!(
                        "book stale for {}ms (threshold {}ms), triggering recover()",
                        health.last_update_ms, stale_threshold_ms
                    );
                    if let Err(e) = book.recover().await {
                        error!("recover() failed during health watchdog: {}", e);
                    }
                }
            }
        })
    };

    let validation = {
        let ledger = ledger.clone();
        let flag = flag.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(flush_interval.max(Duration::from_millis(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if flag.should_stop() {
                    break;
                }
                ledger.process_due(Utc::now());
                ledger.flush();
            }
        })
    };

    MaintenanceHandles {
        flag,
        prune,
        watchdog,
        validation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OrderBookConfig, ValidationConfig};
    use crate::orderbook::RestSnapshot;

    #[tokio::test(flavor = "multi_thread")]
    async fn maintenance_tasks_start_and_stop_cleanly() {
        let book = Arc::new(OrderBookState::new(OrderBookConfig {
            price_precision: 2,
            prune_interval_ms: 10,
            health_check_interval_secs: 1,
            ..Default::default()
        }));
        book.load_snapshot(RestSnapshot {
            last_update_id: 1,
            bids: vec![("100.00".to_string(), "10".to_string())],
            asks: vec![("100.01".to_string(), "10".to_string())],
        })
        .unwrap();

        let ledger = Arc::new(SignalValidationLedger::new(ValidationConfig {
            output_dir: "/tmp/microstructure-maintenance-tests".to_string(),
            ..Default::default()
        }));

        let handles = spawn_maintenance_tasks(book, ledger, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handles.shutdown().await;
    }
}

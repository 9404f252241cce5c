//! Signal validation ledger.
//!
//! Tracks every emitted signal and every rejection against the price
//! trajectory that follows, classifying each as take-profit, stop-loss, or
//! neither, and persisting the outcome. Owns its pending tables and price
//! history exclusively; nothing else mutates them (see `OrderFlowPreprocessor`
//! for the analogous one-way relationship with the book).

pub mod persistence;
pub mod timer_wheel;
pub mod types;

use crate::config::ValidationConfig;
use crate::errors::LedgerError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use persistence::OutcomeWriter;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use timer_wheel::{RecordKind, TimerEntry, TimerWheel};
use tracing::debug;
pub use types::*;

const INSUFFICIENT_VOLUME_REASON: &str = "Insufficient aggregate volume";

struct OutcomeWalk {
    status: TpSlStatus,
    actual_tp_price: Option<f64>,
    actual_sl_price: Option<f64>,
    time_to_tp_mins: Option<u64>,
    max_favorable_move: f64,
}

/// Implements the `checkSignalOutcome` algorithm exactly: walk the price
/// trajectory from `origin_time` to `deadline`, track whether SL was crossed
/// before TP, and classify accordingly.
fn check_signal_outcome<'a>(
    origin_price: f64,
    side: Side,
    origin_time: DateTime<Utc>,
    history: impl IntoIterator<Item = &'a (DateTime<Utc>, f64)>,
    config: &ValidationConfig,
) -> OutcomeWalk {
    let (tp, sl) = match side {
        Side::Buy => (
            origin_price * (1.0 + config.take_profit_pct),
            origin_price * (1.0 - config.stop_loss_pct),
        ),
        Side::Sell => (
            origin_price * (1.0 - config.take_profit_pct),
            origin_price * (1.0 + config.stop_loss_pct),
        ),
    };

    let mut best_favorable = 0.0_f64;
    let mut tp_hit = false;
    let mut hit_stop_loss_first = false;
    let mut actual_tp_price = None;
    let mut actual_sl_price = None;
    let mut time_to_tp_mins = None;

    for &(t, price) in history {
        if t < origin_time {
            continue;
        }
        let favorable_move = match side {
            Side::Buy => price - origin_price,
            Side::Sell => origin_price - price,
        };
        best_favorable = best_favorable.max(favorable_move);

        if !tp_hit {
            let crossed_sl = match side {
                Side::Buy => price <= sl,
                Side::Sell => price >= sl,
            };
            if crossed_sl {
                hit_stop_loss_first = true;
                actual_sl_price = Some(price);
            }
        }

        let crossed_tp = match side {
            Side::Buy => price >= tp,
            Side::Sell => price <= tp,
        };
        if crossed_tp && !tp_hit {
            tp_hit = true;
            actual_tp_price = Some(price);
            time_to_tp_mins = Some((t - origin_time).num_minutes().max(0) as u64);
        }
    }

    let status = if hit_stop_loss_first {
        TpSlStatus::Sl
    } else if tp_hit {
        TpSlStatus::Tp
    } else {
        TpSlStatus::Pending
    };

    OutcomeWalk {
        status,
        actual_tp_price,
        actual_sl_price,
        time_to_tp_mins,
        max_favorable_move: best_favorable,
    }
}

struct LedgerInner {
    pending_signals: HashMap<u64, ValidationRecord>,
    pending_rejections: HashMap<u64, ValidationRecord>,
    price_history: VecDeque<(DateTime<Utc>, f64)>,
    timers: TimerWheel,
    write_buffer: Vec<(PathBuf, String)>,
}

pub struct SignalValidationLedger {
    config: ValidationConfig,
    inner: Mutex<LedgerInner>,
    writer: OutcomeWriter,
}

impl SignalValidationLedger {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(LedgerInner {
                pending_signals: HashMap::new(),
                pending_rejections: HashMap::new(),
                price_history: VecDeque::new(),
                timers: TimerWheel::new(),
                write_buffer: Vec::new(),
            }),
            writer: OutcomeWriter::new(),
        }
    }

    /// Append the latest traded price and evict anything older than the
    /// configured history horizon.
    pub fn update_current_price(&self, price: f64, now: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        inner.price_history.push_back((now, price));
        let horizon = ChronoDuration::seconds(self.config.price_history_horizon_secs as i64);
        while let Some(&(t, _)) = inner.price_history.front() {
            if now - t > horizon {
                inner.price_history.pop_front();
            } else {
                break;
            }
        }
    }

    fn schedule_checks(&self, inner: &mut LedgerInner, record_id: u64, kind: RecordKind, origin: DateTime<Utc>) {
        let horizon = *self.config.check_offsets_mins.last().unwrap();
        for &offset in &self.config.check_offsets_mins {
            inner.timers.schedule(TimerEntry {
                deadline: origin + ChronoDuration::minutes(offset as i64),
                record_id,
                kind,
                is_final: offset == horizon,
            });
        }
    }

    pub fn submit_signal(&self, candidate: SignalCandidate) {
        let record = ValidationRecord::new_signal(&candidate);
        let mut inner = self.inner.lock();
        self.schedule_checks(&mut inner, candidate.signal_id, RecordKind::Signal, candidate.timestamp);
        inner.pending_signals.insert(candidate.signal_id, record);
    }

    pub fn submit_rejection(&self, rejection: RejectedSignal) {
        let record = ValidationRecord::new_rejection(&rejection);
        let mut inner = self.inner.lock();
        self.schedule_checks(&mut inner, rejection.rejection_id, RecordKind::Rejection, rejection.timestamp);
        inner.pending_rejections.insert(rejection.rejection_id, record);
    }

    /// Run every due check. Driven by a periodic background task (see
    /// `crate::maintenance::spawn_maintenance_tasks`), cooperatively rather
    /// than per-signal timers.
    pub fn process_due(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        let due = inner.timers.drain_due(now);
        if due.is_empty() {
            return;
        }
        let history = inner.price_history.clone();

        for entry in due {
            self.process_one(&mut inner, entry, &history);
        }

        self.maybe_flush(&mut inner);
    }

    fn process_one(&self, inner: &mut LedgerInner, entry: TimerEntry, history: &VecDeque<(DateTime<Utc>, f64)>) {
        let record = match entry.kind {
            RecordKind::Signal => inner.pending_signals.get_mut(&entry.record_id),
            RecordKind::Rejection => inner.pending_rejections.get_mut(&entry.record_id),
        };
        let Some(record) = record else {
            return;
        };

        let walk = check_signal_outcome(record.origin_price, record.side, record.origin_timestamp, history, &self.config);
        record.max_favorable_move = walk.max_favorable_move;
        if walk.actual_tp_price.is_some() {
            record.actual_tp_price = walk.actual_tp_price;
        }
        if walk.actual_sl_price.is_some() {
            record.actual_sl_price = walk.actual_sl_price;
        }
        if walk.time_to_tp_mins.is_some() {
            record.time_to_tp_mins = walk.time_to_tp_mins;
        }
        if walk.status != TpSlStatus::Pending {
            record.tp_sl_status = walk.status;
        }

        let resolved = record.tp_sl_status != TpSlStatus::Pending;
        if !(entry.is_final || resolved) {
            return;
        }

        let removed = match entry.kind {
            RecordKind::Signal => inner.pending_signals.remove(&entry.record_id),
            RecordKind::Rejection => inner.pending_rejections.remove(&entry.record_id),
        };
        let Some(mut finished) = removed else {
            return;
        };
        if finished.tp_sl_status == TpSlStatus::Pending {
            finished.tp_sl_status = TpSlStatus::Neither;
        }
        inner.timers.cancel(entry.record_id, entry.kind);
        self.finalize(inner, entry.kind, finished);
    }

    fn finalize(&self, inner: &mut LedgerInner, kind: RecordKind, mut record: ValidationRecord) {
        let successful = record.tp_sl_status == TpSlStatus::Tp;
        record.signal_quality = Some(if successful {
            match record.side {
                Side::Buy => SignalQuality::Bottom,
                Side::Sell => SignalQuality::Top,
            }
        } else {
            SignalQuality::Noise
        });

        let base_kind = match kind {
            RecordKind::Signal => "validation",
            RecordKind::Rejection => "rejections",
        };
        self.enqueue(inner, base_kind, &record);

        if kind == RecordKind::Signal && successful {
            self.enqueue(inner, "successful", &record);
        }
        if kind == RecordKind::Rejection
            && successful
            && record.rejection_reason.as_deref() != Some(INSUFFICIENT_VOLUME_REASON)
        {
            self.enqueue(inner, "rejected_missed", &record);
        }
    }

    fn enqueue(&self, inner: &mut LedgerInner, kind: &str, record: &ValidationRecord) {
        let detector = serde_json::to_value(record.detector_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        let date = Utc::now().format("%Y-%m-%d");
        let path = PathBuf::from(&self.config.output_dir).join(format!("{detector}_{kind}_{date}.jsonl"));
        match serde_json::to_string(record) {
            Ok(line) => inner.write_buffer.push((path, line)),
            Err(e) => debug!("failed to serialize validation record {}: {}", record.id, e),
        }
    }

    fn maybe_flush(&self, inner: &mut LedgerInner) {
        if inner.write_buffer.len() >= self.config.max_buffer_size {
            self.flush_locked(inner);
        }
    }

    /// Force a flush regardless of buffer size. Called by the periodic
    /// flush task as well as on shutdown.
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        self.flush_locked(&mut inner);
    }

    fn flush_locked(&self, inner: &mut LedgerInner) {
        if inner.write_buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut inner.write_buffer);
        self.writer.flush_batch(batch);
    }

    /// Cancel all outstanding checks and flush whatever is buffered.
    /// Pending (unresolved) records are left undecided by design — the spec
    /// only requires that previously *accepted* trades produce or persist an
    /// outcome, not that in-flight 90-minute windows are force-classified.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.timers.cancel_all();
        self.flush_locked(&mut inner);
    }

    pub fn pending_signal(&self, signal_id: u64) -> Result<ValidationRecord, LedgerError> {
        self.inner
            .lock()
            .pending_signals
            .get(&signal_id)
            .cloned()
            .ok_or(LedgerError::UnknownSignal(signal_id))
    }

    pub fn pending_rejection(&self, rejection_id: u64) -> Result<ValidationRecord, LedgerError> {
        self.inner
            .lock()
            .pending_rejections
            .get(&rejection_id)
            .cloned()
            .ok_or(LedgerError::UnknownRejection(rejection_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ValidationConfig {
        ValidationConfig {
            output_dir: "/tmp/microstructure-ledger-tests".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn tp_before_sl_classifies_tp_for_buy_signal() {
        let t0 = Utc::now();
        let history = vec![
            (t0 + ChronoDuration::minutes(1), 100.20),
            (t0 + ChronoDuration::minutes(5), 100.50),
            (t0 + ChronoDuration::minutes(20), 100.71),
        ];
        let walk = check_signal_outcome(100.0, Side::Buy, t0, &history, &base_config());
        assert_eq!(walk.status, TpSlStatus::Tp);
        assert_eq!(walk.actual_tp_price, Some(100.71));
        assert_eq!(walk.time_to_tp_mins, Some(20));
    }

    #[test]
    fn sl_before_tp_invalidates_success() {
        let t0 = Utc::now();
        let history = vec![
            (t0 + ChronoDuration::minutes(1), 99.60),
            (t0 + ChronoDuration::minutes(30), 100.71),
        ];
        let walk = check_signal_outcome(100.0, Side::Buy, t0, &history, &base_config());
        assert_eq!(walk.status, TpSlStatus::Sl);
    }

    #[test]
    fn missed_opportunity_on_rejection_reaches_tp() {
        let t0 = Utc::now();
        let history = vec![(t0 + ChronoDuration::minutes(45), 50.40)];
        let walk = check_signal_outcome(50.0, Side::Buy, t0, &history, &base_config());
        assert_eq!(walk.status, TpSlStatus::Tp);
    }

    #[test]
    fn submit_and_process_due_finalizes_at_horizon() {
        let ledger = SignalValidationLedger::new(base_config());
        let t0 = Utc::now();
        ledger.submit_signal(SignalCandidate {
            signal_id: 1,
            side: Side::Buy,
            price: 100.0,
            timestamp: t0,
            confidence: 0.9,
            threshold_checks: ThresholdChecks::Absorption {
                absorption_ratio: 0.8,
                passive_volume: 500.0,
                aggressive_volume: 100.0,
            },
        });
        ledger.update_current_price(100.71, t0 + ChronoDuration::minutes(20));
        ledger.process_due(t0 + ChronoDuration::minutes(91));
        assert!(ledger.pending_signal(1).is_err());
    }
}

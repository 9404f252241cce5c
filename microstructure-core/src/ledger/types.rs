//! Ledger data model.
//!
//! `ThresholdChecks` is a tagged union keyed by detector type — per this
//! spec's explicit redesign note, it must not degrade into a free-form map
//! the way the source's dynamically-typed payload did.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorType {
    Absorption,
    Exhaustion,
    Deltacvd,
}

/// Detector-specific threshold evidence. Keyed by `detector_type` on the wire
/// so each variant's fields are named rather than shoved into a generic map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "detector_type", rename_all = "snake_case")]
pub enum ThresholdChecks {
    Absorption {
        absorption_ratio: f64,
        passive_volume: f64,
        aggressive_volume: f64,
    },
    Exhaustion {
        exhaustion_score: f64,
        declining_volume_ticks: u32,
    },
    Deltacvd {
        cvd_delta: f64,
        cvd_threshold: f64,
    },
}

impl ThresholdChecks {
    pub fn detector_type(&self) -> DetectorType {
        match self {
            ThresholdChecks::Absorption { .. } => DetectorType::Absorption,
            ThresholdChecks::Exhaustion { .. } => DetectorType::Exhaustion,
            ThresholdChecks::Deltacvd { .. } => DetectorType::Deltacvd,
        }
    }
}

/// A candidate signal submitted by a detector (out of scope; only this
/// contract is specified).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalCandidate {
    pub signal_id: u64,
    pub side: Side,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    pub threshold_checks: ThresholdChecks,
}

/// A signal a detector chose not to emit, tracked for missed-opportunity analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedSignal {
    pub rejection_id: u64,
    pub side: Side,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub threshold_checks: ThresholdChecks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TpSlStatus {
    Pending,
    Tp,
    Sl,
    Neither,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalQuality {
    Top,
    Bottom,
    Noise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrigin {
    Signal,
    Rejection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: u64,
    #[serde(skip)]
    pub origin: RecordOriginSerde,
    pub detector_type: DetectorType,
    pub side: Side,
    pub origin_price: f64,
    pub origin_timestamp: DateTime<Utc>,
    pub threshold_checks: ThresholdChecks,
    pub rejection_reason: Option<String>,

    pub max_favorable_move: f64,
    pub actual_tp_price: Option<f64>,
    pub actual_sl_price: Option<f64>,
    pub time_to_tp_mins: Option<u64>,
    pub tp_sl_status: TpSlStatus,
    pub signal_quality: Option<SignalQuality>,
}

/// `RecordOrigin` isn't itself serialized (it determines *which file* the
/// record goes to, not a field within it) but needs `Default` to satisfy
/// `#[serde(skip)]` on deserialize; this newtype carries that impl without
/// polluting the public enum with serde derives it doesn't otherwise need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOriginSerde(pub RecordOrigin);

impl Default for RecordOriginSerde {
    fn default() -> Self {
        RecordOriginSerde(RecordOrigin::Signal)
    }
}

impl ValidationRecord {
    pub fn new_signal(candidate: &SignalCandidate) -> Self {
        Self {
            id: candidate.signal_id,
            origin: RecordOriginSerde(RecordOrigin::Signal),
            detector_type: candidate.threshold_checks.detector_type(),
            side: candidate.side,
            origin_price: candidate.price,
            origin_timestamp: candidate.timestamp,
            threshold_checks: candidate.threshold_checks.clone(),
            rejection_reason: None,
            max_favorable_move: 0.0,
            actual_tp_price: None,
            actual_sl_price: None,
            time_to_tp_mins: None,
            tp_sl_status: TpSlStatus::Pending,
            signal_quality: None,
        }
    }

    pub fn new_rejection(rejection: &RejectedSignal) -> Self {
        Self {
            id: rejection.rejection_id,
            origin: RecordOriginSerde(RecordOrigin::Rejection),
            detector_type: rejection.threshold_checks.detector_type(),
            side: rejection.side,
            origin_price: rejection.price,
            origin_timestamp: rejection.timestamp,
            threshold_checks: rejection.threshold_checks.clone(),
            rejection_reason: Some(rejection.reason.clone()),
            max_favorable_move: 0.0,
            actual_tp_price: None,
            actual_sl_price: None,
            time_to_tp_mins: None,
            tp_sl_status: TpSlStatus::Pending,
            signal_quality: None,
        }
    }
}

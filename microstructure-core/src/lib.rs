//! Microstructure Core
//!
//! Real-time market microstructure core for a cryptocurrency order-flow
//! analytics system. Ingests depth diffs and aggregated trades from a spot
//! exchange and maintains the derived state from which pattern detectors
//! (absorption, exhaustion, accumulation/distribution zones) operate.
//!
//! ## Core modules
//! - `orderbook`: incrementally maintained full-depth book, sequence-gap
//!   detection, circuit breaking, pruning.
//! - `preprocessor`: trade enrichment and multi-resolution tick zones.
//! - `ledger`: signal/rejection outcome tracking and persistence.
//! - `maintenance`: the timer-driven background tasks (pruning, health
//!   watchdog, ledger draining/flush) that keep the above three off the
//!   trade hot path.
//! - `config`, `errors`, `fixed_point`, `metrics`, `logging`: shared ambient
//!   infrastructure used by all three.

pub mod config;
pub mod errors;
pub mod fixed_point;
pub mod ledger;
pub mod logging;
pub mod maintenance;
pub mod metrics;
pub mod metrics_server;
pub mod orderbook;
pub mod preprocessor;

pub use config::MicrostructureConfig;
pub use errors::{LedgerError, OrderBookError, ParseError, PreprocessorError};
pub use fixed_point::{Qty, Ticks};
pub use metrics::CoreMetrics;

/// Convenient imports for crates consuming `microstructure-core`.
pub mod prelude {
    pub use crate::config::{MicrostructureConfig, OrderBookConfig, ValidationConfig, ZoneConfig};
    pub use crate::errors::{LedgerError, OrderBookError, ParseError, PreprocessorError};
    pub use crate::fixed_point::{Qty, Ticks};
    pub use crate::ledger::{
        RejectedSignal, Side, SignalCandidate, SignalValidationLedger, ThresholdChecks,
    };
    pub use crate::maintenance::{spawn_maintenance_tasks, MaintenanceHandles};
    pub use crate::orderbook::{DepthDiff, OrderBookState, RestSnapshot, SnapshotSource};
    pub use crate::preprocessor::{AggTrade, EnrichedTrade, OrderFlowPreprocessor};
}

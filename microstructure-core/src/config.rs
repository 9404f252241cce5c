//! Immutable configuration passed by reference at construction.
//!
//! Per the teacher's own design notes (`config/mod.rs` describes a
//! migration away from a process-wide `Config` singleton), and per this
//! spec's explicit redesign flag on global mutable state, there is no
//! `Config::global()` anywhere in this crate. Each subsystem is handed an
//! `Arc<MicrostructureConfig>` (or a narrower sub-config) at construction
//! and holds it for its lifetime.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the three subsystems.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicrostructureConfig {
    pub order_book: OrderBookConfig,
    pub zones: ZoneConfig,
    pub validation: ValidationConfig,
}

impl Default for MicrostructureConfig {
    fn default() -> Self {
        Self {
            order_book: OrderBookConfig::default(),
            zones: ZoneConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

/// Configuration for [`crate::orderbook::OrderBookState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookConfig {
    /// Decimal places defining tick size: `tickSize = 10^-pricePrecision`.
    pub price_precision: u32,

    /// Hard cap on the number of price levels retained.
    pub max_levels: usize,

    /// Relative distance from mid beyond which levels are pruned (e.g. 0.1 = 10%).
    pub max_price_distance: f64,

    /// Maintenance cadence for pruning passes.
    pub prune_interval_ms: u64,

    /// Error count within the rolling 60s window that trips the circuit breaker.
    pub max_error_rate: u32,

    /// Health watchdog poll cadence.
    pub health_check_interval_secs: u64,

    /// Watchdog staleness threshold before `recover()` is triggered automatically.
    pub health_stale_threshold_secs: u64,
}

impl Default for OrderBookConfig {
    fn default() -> Self {
        Self {
            price_precision: 2,
            max_levels: 5_000,
            max_price_distance: 0.10,
            prune_interval_ms: 5_000,
            max_error_rate: 10,
            health_check_interval_secs: 10,
            health_stale_threshold_secs: 30,
        }
    }
}

impl OrderBookConfig {
    #[inline]
    pub fn tick_size(&self) -> f64 {
        10f64.powi(-(self.price_precision as i32))
    }
}

/// Weights used by [`crate::preprocessor::zone::find_most_relevant_zone`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceWeights {
    pub tick_distance: f64,
    pub volume: f64,
    pub passive_ratio: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            tick_distance: 0.4,
            volume: 0.35,
            passive_ratio: 0.25,
        }
    }
}

/// Configuration for [`crate::preprocessor::OrderFlowPreprocessor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// The three zone resolutions, in ticks.
    pub base_ticks: [u32; 3],

    /// Rolling window over which zone volume is aggregated.
    pub time_window_secs: u64,

    /// Bound on `StandardZoneData` payload size: nearest K zones per resolution.
    pub max_zones_per_resolution: usize,

    /// Band half-width (in ticks) used for `zonePassiveBid`/`zonePassiveAsk`.
    pub zone_band_ticks: u32,

    pub relevance_weights: RelevanceWeights,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            base_ticks: [5, 10, 20],
            time_window_secs: 60,
            max_zones_per_resolution: 10,
            zone_band_ticks: 10,
            relevance_weights: RelevanceWeights::default(),
        }
    }
}

/// Configuration for [`crate::ledger::SignalValidationLedger`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Take-profit threshold, as a fraction (0.007 = 0.7%).
    pub take_profit_pct: f64,

    /// Stop-loss threshold, as a fraction (0.0035 = 0.35%).
    pub stop_loss_pct: f64,

    /// Scheduled check offsets, in minutes, from signal/rejection origin.
    pub check_offsets_mins: [u64; 4],

    /// Final classification horizon, in minutes (also the last check offset).
    pub horizon_mins: u64,

    /// In-memory outcome record buffer cap before a forced flush.
    pub max_buffer_size: usize,

    /// Periodic flush cadence.
    pub flush_interval_secs: u64,

    /// How much price history to retain for trajectory walks.
    pub price_history_horizon_secs: u64,

    /// Directory under which per-(detector,kind,date) JSONL files are written.
    pub output_dir: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            take_profit_pct: 0.007,
            stop_loss_pct: 0.0035,
            check_offsets_mins: [5, 15, 60, 90],
            horizon_mins: 90,
            max_buffer_size: 256,
            flush_interval_secs: 5,
            price_history_horizon_secs: 2 * 60 * 60,
            output_dir: "data/validation".to_string(),
        }
    }
}

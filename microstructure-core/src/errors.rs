//! Domain error types for the microstructure core.
//!
//! `thiserror` derives cover these (the corpus reaches for it wherever a
//! from-scratch error enum needs `Display`/`Error`, e.g. `orderbook-rs`'s
//! wire errors); `anyhow` is reserved for binary-boundary glue in
//! `microstructure-bins`, never used inside library hot paths.

use thiserror::Error;

/// Failure parsing a decimal string at the ingress boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid numeric value: {0}")]
    InvalidNumber(String),
}

/// Errors raised while applying or querying order book state.
#[derive(Debug, Error)]
pub enum OrderBookError {
    #[error("sequence gap: expected update starting at {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },

    #[error("circuit breaker open, update rejected")]
    CircuitOpen,

    #[error("malformed diff: {0}")]
    Parse(#[from] ParseError),

    #[error("REST snapshot fetch failed: {0}")]
    SnapshotFetch(String),
}

/// Errors raised while enriching a trade.
#[derive(Debug, Error)]
pub enum PreprocessorError {
    #[error("order book unavailable: {0}")]
    BookUnavailable(String),

    #[error("malformed trade: {0}")]
    Parse(#[from] ParseError),
}

/// Errors raised by the signal validation ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("persistence flush failed after retry: {0}")]
    FlushFailed(String),

    #[error("unknown signal id: {0}")]
    UnknownSignal(u64),

    #[error("unknown rejection id: {0}")]
    UnknownRejection(u64),
}

use crate::fixed_point::{Qty, Ticks};
use std::time::Instant;

/// A single price level in the book.
///
/// Deleted from the map the instant both sides go to zero — there is no
/// "empty but present" level outside of the stale-prune window (see
/// `OrderBookState::prune`).
#[derive(Debug, Clone, Copy)]
pub struct PriceLevel {
    pub price: Ticks,
    pub bid_qty: Qty,
    pub ask_qty: Qty,
    pub last_update: Instant,
}

impl PriceLevel {
    pub fn new(price: Ticks, bid_qty: Qty, ask_qty: Qty, now: Instant) -> Self {
        Self {
            price,
            bid_qty,
            ask_qty,
            last_update: now,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bid_qty.is_zero() && self.ask_qty.is_zero()
    }
}

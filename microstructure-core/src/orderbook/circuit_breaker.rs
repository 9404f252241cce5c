//! Error-rate circuit breaker for `OrderBookState::update_depth`.
//!
//! Generalized from `resilience::circuit_breaker::CircuitBreaker`'s
//! closed/open/half-open shape, but trigger semantics are the spec's own:
//! a rolling 60s error window and a fixed 30s cooldown, not the teacher's
//! configurable failure-threshold/timeout pair (those are request-latency
//! oriented; this one counts malformed/gapped updates).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const ERROR_WINDOW: Duration = Duration::from_secs(60);
const COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct ErrorRateBreaker {
    max_error_rate: u32,
    errors: VecDeque<Instant>,
    open_until: Option<Instant>,
    rejections: u64,
}

impl ErrorRateBreaker {
    pub fn new(max_error_rate: u32) -> Self {
        Self {
            max_error_rate,
            errors: VecDeque::new(),
            open_until: None,
            rejections: 0,
        }
    }

    /// Record an error (parse failure or sequence gap) at `now`.
    pub fn record_error(&mut self, now: Instant) {
        self.errors.push_back(now);
        self.evict_expired(now);
        if self.errors.len() as u32 >= self.max_error_rate {
            self.open_until = Some(now + COOLDOWN);
        }
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(&front) = self.errors.front() {
            if now.duration_since(front) > ERROR_WINDOW {
                self.errors.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns true if the breaker is currently open (rejecting updates).
    /// Auto-closes once the cooldown has elapsed.
    pub fn is_open(&mut self, now: Instant) -> bool {
        match self.open_until {
            Some(until) if now < until => {
                self.rejections += 1;
                true
            }
            Some(_) => {
                self.open_until = None;
                false
            }
            None => false,
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn rejection_count(&self) -> u64 {
        self.rejections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_errors() {
        let mut breaker = ErrorRateBreaker::new(3);
        let t0 = Instant::now();
        assert!(!breaker.is_open(t0));
        breaker.record_error(t0);
        breaker.record_error(t0);
        assert!(!breaker.is_open(t0));
        breaker.record_error(t0);
        assert!(breaker.is_open(t0));
    }

    #[test]
    fn auto_closes_after_cooldown() {
        let mut breaker = ErrorRateBreaker::new(1);
        let t0 = Instant::now();
        breaker.record_error(t0);
        assert!(breaker.is_open(t0));
        let later = t0 + Duration::from_secs(31);
        assert!(!breaker.is_open(later));
    }

    #[test]
    fn old_errors_fall_out_of_window() {
        let mut breaker = ErrorRateBreaker::new(2);
        let t0 = Instant::now();
        breaker.record_error(t0);
        let t1 = t0 + Duration::from_secs(61);
        breaker.record_error(t1);
        // first error aged out, so only 1 counted -> still closed
        assert!(!breaker.is_open(t1));
    }
}

//! Deadline-ordered timer wheel.
//!
//! Per this spec's explicit "timer storms" redesign note: four per-signal
//! timers at high signal rates would mean thousands of live `tokio::time`
//! sleepers. Instead every check is a `TimerEntry` in one `BinaryHeap`
//! ordered by deadline; a single periodic driver pops everything that's due.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Signal,
    Rejection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEntry {
    pub deadline: DateTime<Utc>,
    pub record_id: u64,
    pub kind: RecordKind,
    /// Whether this is the final (horizon) check for the record.
    pub is_final: bool,
}

// Reverse order on `deadline` so `BinaryHeap` (a max-heap) pops the earliest
// deadline first.
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.deadline.cmp(&self.deadline)
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct TimerWheel {
    heap: BinaryHeap<TimerEntry>,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub fn schedule(&mut self, entry: TimerEntry) {
        self.heap.push(entry);
    }

    /// Pop and return every entry whose deadline has passed.
    pub fn drain_due(&mut self, now: DateTime<Utc>) -> Vec<TimerEntry> {
        let mut due = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.deadline <= now {
                due.push(self.heap.pop().unwrap());
            } else {
                break;
            }
        }
        due
    }

    /// Drop all outstanding timers for a record (shutdown / cancellation).
    pub fn cancel(&mut self, record_id: u64, kind: RecordKind) {
        let remaining: Vec<TimerEntry> = self
            .heap
            .drain()
            .filter(|e| !(e.record_id == record_id && e.kind == kind))
            .collect();
        self.heap.extend(remaining);
    }

    pub fn cancel_all(&mut self) {
        self.heap.clear();
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn drains_only_due_entries_in_deadline_order() {
        let mut wheel = TimerWheel::new();
        let t0 = Utc::now();
        wheel.schedule(TimerEntry {
            deadline: t0 + Duration::minutes(60),
            record_id: 1,
            kind: RecordKind::Signal,
            is_final: false,
        });
        wheel.schedule(TimerEntry {
            deadline: t0 + Duration::minutes(5),
            record_id: 1,
            kind: RecordKind::Signal,
            is_final: false,
        });
        wheel.schedule(TimerEntry {
            deadline: t0 + Duration::minutes(15),
            record_id: 1,
            kind: RecordKind::Signal,
            is_final: false,
        });

        let due = wheel.drain_due(t0 + Duration::minutes(20));
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].deadline, t0 + Duration::minutes(5));
        assert_eq!(due[1].deadline, t0 + Duration::minutes(15));
        assert_eq!(wheel.len(), 1);
    }

    #[test]
    fn cancel_removes_only_matching_record() {
        let mut wheel = TimerWheel::new();
        let t0 = Utc::now();
        wheel.schedule(TimerEntry {
            deadline: t0,
            record_id: 1,
            kind: RecordKind::Signal,
            is_final: false,
        });
        wheel.schedule(TimerEntry {
            deadline: t0,
            record_id: 2,
            kind: RecordKind::Signal,
            is_final: false,
        });
        wheel.cancel(1, RecordKind::Signal);
        assert_eq!(wheel.len(), 1);
    }
}

//! Process-wide logical clock stamping historical counters (`spec.md` §4.4,
//! §5 "Shared-resource policy").
//!
//! Advanced once at the start of every public façade entry point. Used only
//! to stamp `HistoricalInfo::timestamp` on subsequent writes and to give a
//! single call a consistent "now" across the word store and bigram store —
//! it carries no relation to wall-clock time.

use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct LogicalClock {
    tick: AtomicU32,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self {
            tick: AtomicU32::new(0),
        }
    }

    /// Advance and return the new value. Monotonic within a process run.
    pub fn advance(&self) -> u32 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn current(&self) -> u32 {
        self.tick.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_monotonically() {
        let clock = LogicalClock::new();
        let a = clock.advance();
        let b = clock.advance();
        let c = clock.advance();
        assert!(a < b);
        assert!(b < c);
        assert_eq!(clock.current(), c);
    }
}

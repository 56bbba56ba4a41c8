//! Round-robin rotation cursor.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Rotation cursor over a fixed-size node list.
/// The stored value is always a valid index for the length it was last used with.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current starting index and move the cursor to the one after it.
    pub fn advance(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let prev = self
            .counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c % len + 1) % len))
            .unwrap_or_else(|c| c);
        prev % len
    }

    pub fn position(&self) -> usize {
        self.counter.load(Ordering::Acquire)
    }

    pub fn set(&self, index: usize) {
        self.counter.store(index, Ordering::Release);
    }
}

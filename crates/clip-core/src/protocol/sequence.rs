//! Per-connection sequence numbering for outgoing frames.
//!
//! Every frame header carries a sequence number.  Receivers do not reorder
//! on it (TCP already delivers in order); it exists so a frame seen in a log
//! or packet capture can be matched to the write that produced it.

use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe, monotonically increasing counter for frame sequence numbers.
///
/// Starts at 0 and wraps at `u64::MAX` back to 0 without panicking.
///
/// # Examples
///
/// ```rust
/// use clip_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 0);
/// assert_eq!(counter.next(), 1);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(0),
        }
    }

    /// Returns the next sequence number and atomically increments the counter.
    ///
    /// `Relaxed` ordering is enough: the value labels frames and is never
    /// used to publish other memory.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the value the next call to [`next`](Self::next) would yield.
    pub fn current(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

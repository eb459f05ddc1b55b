//! Bounded deduplication ring for live feed events.
//!
//! The backend may rebroadcast an event after a reconnect; a fixed-size
//! ring of seen IDs keeps the feed surface duplicate-free with bounded
//! memory regardless of stream duration.

use std::collections::VecDeque;

/// Default capacity for the deduplication ring.
/// Sized for roughly a day of broadcast events.
pub const DEFAULT_CAPACITY: usize = 1_024;

/// A bounded ring buffer deduplicating events by ID.
///
/// Evicts oldest entries when full, so memory stays bounded no matter how
/// long the feed runs.
#[derive(Debug)]
pub struct DedupRing {
    /// Ring of seen IDs (oldest at front, newest at back)
    seen: VecDeque<String>,
    /// Maximum capacity
    capacity: usize,
    /// Total events checked (for stats)
    total_seen: u64,
    /// Total duplicates skipped
    total_dupes: u64,
}

impl DedupRing {
    /// Create a new deduplication ring with the specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");

        Self {
            seen: VecDeque::with_capacity(capacity),
            capacity,
            total_seen: 0,
            total_dupes: 0,
        }
    }

    /// Create a new deduplication ring with default capacity.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Check whether an event ID is new, marking it as seen if so.
    ///
    /// Returns `true` the first time an ID is observed and `false` for
    /// duplicates still tracked by the ring.
    pub fn check_and_mark(&mut self, id: &str) -> bool {
        self.total_seen += 1;

        if self.seen.iter().any(|seen| seen.as_str() == id) {
            self.total_dupes += 1;
            return false;
        }

        // Evict oldest if at capacity (FIFO)
        if self.seen.len() >= self.capacity {
            self.seen.pop_front();
        }
        self.seen.push_back(id.to_string());

        debug_assert!(self.seen.len() <= self.capacity);
        true
    }

    /// Get the current number of tracked IDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if the ring is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Get total events checked.
    #[must_use]
    pub fn total_seen(&self) -> u64 {
        self.total_seen
    }

    /// Get total duplicates skipped.
    #[must_use]
    pub fn total_dupes(&self) -> u64 {
        self.total_dupes
    }
}

impl Default for DedupRing {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_pass() {
        let mut ring = DedupRing::new(100);

        assert!(ring.check_and_mark("eq-1"));
        assert!(ring.check_and_mark("eq-2"));
        assert!(ring.check_and_mark("eq-3"));

        assert_eq!(ring.len(), 3);
        assert_eq!(ring.total_seen(), 3);
        assert_eq!(ring.total_dupes(), 0);
    }

    #[test]
    fn test_duplicates_suppressed() {
        let mut ring = DedupRing::new(100);

        assert!(ring.check_and_mark("eq-1"));
        assert!(!ring.check_and_mark("eq-1"));
        assert!(!ring.check_and_mark("eq-1"));

        assert_eq!(ring.len(), 1);
        assert_eq!(ring.total_dupes(), 2);
    }

    #[test]
    fn test_bounded_capacity() {
        let mut ring = DedupRing::new(3);

        ring.check_and_mark("eq-1");
        ring.check_and_mark("eq-2");
        ring.check_and_mark("eq-3");
        assert_eq!(ring.len(), 3);

        // Fourth ID evicts the oldest
        ring.check_and_mark("eq-4");
        assert_eq!(ring.len(), 3);

        // eq-1 was evicted, so it reads as new again
        assert!(ring.check_and_mark("eq-1"));

        // eq-3 is still tracked
        assert!(!ring.check_and_mark("eq-3"));
    }
}

//! Round-robin cursor shared by concurrent payments.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Index into a fixed-size ring, updated only through atomic operations.
///
/// The stored value is always `< len`.
#[derive(Debug)]
pub struct RoundRobinCursor {
    position: AtomicUsize,
    len: usize,
}

impl RoundRobinCursor {
    /// Cursor over `len` slots, starting at slot 0. `len` must be non-zero.
    pub fn new(len: usize) -> Self {
        debug_assert!(len > 0);
        Self {
            position: AtomicUsize::new(0),
            len,
        }
    }

    /// Current slot.
    pub fn get(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }

    /// Ring size.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; a cursor never covers an empty ring.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slots in probe order starting from `start`, wrapping once.
    pub fn sequence_from(&self, start: usize) -> impl Iterator<Item = usize> {
        let len = self.len;
        (0..len).map(move |i| (start + i) % len)
    }

    /// Step past `slot` and return the slot after it.
    ///
    /// The cursor only moves if it still points at `slot`; a caller that
    /// lost the race still gets the slot after the one it used, so two
    /// concurrent steps past the same slot never cancel out.
    pub fn advance_from(&self, slot: usize) -> usize {
        let next = (slot + 1) % self.len;
        let _ = self.position.compare_exchange(
            slot % self.len,
            next,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        next
    }

    /// Move from `expected` to `slot`, unless another task moved the cursor first.
    ///
    /// Returns true if this call changed (or confirmed) the position.
    pub fn settle(&self, expected: usize, slot: usize) -> bool {
        let slot = slot % self.len;
        if expected == slot {
            return self.get() == slot;
        }
        self.position
            .compare_exchange(expected, slot, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_advance_from_wraps() {
        let cursor = RoundRobinCursor::new(3);
        assert_eq!(cursor.get(), 0);
        assert_eq!(cursor.advance_from(0), 1);
        assert_eq!(cursor.advance_from(1), 2);
        assert_eq!(cursor.advance_from(2), 0);
        assert_eq!(cursor.get(), 0);
    }

    #[test]
    fn test_sequence_from() {
        let cursor = RoundRobinCursor::new(4);
        let order: Vec<_> = cursor.sequence_from(2).collect();
        assert_eq!(order, vec![2, 3, 0, 1]);
    }

    #[test]
    fn test_settle_loses_to_concurrent_advance() {
        let cursor = RoundRobinCursor::new(3);
        let seen = cursor.get();
        cursor.advance_from(seen);
        assert!(!cursor.settle(seen, 2));
        assert_eq!(cursor.get(), 1);

        assert!(cursor.settle(1, 2));
        assert_eq!(cursor.get(), 2);
    }

    #[test]
    fn test_advance_from_same_slot_does_not_cancel() {
        let cursor = RoundRobinCursor::new(2);
        // Two payments both failed on slot 0.
        assert_eq!(cursor.advance_from(0), 1);
        assert_eq!(cursor.advance_from(0), 1);
        assert_eq!(cursor.get(), 1);

        let cursor = RoundRobinCursor::new(3);
        cursor.advance_from(0);
        // Stale step from 0 leaves the newer position alone.
        assert_eq!(cursor.advance_from(0), 1);
        assert_eq!(cursor.advance_from(1), 2);
        assert_eq!(cursor.get(), 2);
    }

    #[test]
    fn test_concurrent_advance_from_same_slot() {
        let cursor = Arc::new(RoundRobinCursor::new(5));
        assert!(cursor.settle(0, 3));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cursor = cursor.clone();
                std::thread::spawn(move || cursor.advance_from(3))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 4);
        }
        // Only the first step moved the cursor.
        assert_eq!(cursor.get(), 4);
    }
}

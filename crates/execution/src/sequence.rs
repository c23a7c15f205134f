//! Shared cursor over pending operations.

use std::iter::{Enumerate, Peekable};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// An ordered, pull-once cursor shared by every worker lane.
///
/// Each item is handed out exactly once, tagged with its input index.
/// Indices come out strictly increasing, so claiming index `n` means
/// `0..n` were already claimed by some lane.
pub struct WorkSequence<I: Iterator> {
    cursor: Mutex<Peekable<Enumerate<I>>>,
    claimed: AtomicUsize,
    exhausted: AtomicBool,
    closed: AtomicBool,
}

impl<I: Iterator> WorkSequence<I> {
    /// Create a sequence over the given items.
    pub fn new(items: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            cursor: Mutex::new(items.into_iter().enumerate().peekable()),
            claimed: AtomicUsize::new(0),
            exhausted: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Claim the next unclaimed item.
    ///
    /// Returns `None` once the sequence is exhausted or closed. The lock is
    /// held only while advancing the iterator, never across an await.
    pub fn claim(&self) -> Option<(usize, I::Item)> {
        if self.is_closed() {
            return None;
        }

        // A panic inside the caller's iterator poisons the lock; the
        // enumerate state is still consistent, so keep draining.
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return None;
        }

        match cursor.next() {
            Some(claim) => {
                self.claimed.fetch_add(1, Ordering::Release);
                Some(claim)
            }
            None => {
                self.exhausted.store(true, Ordering::Release);
                None
            }
        }
    }

    /// Whether any item is left unclaimed, ignoring [`close`](Self::close).
    ///
    /// Answered from the iterator's size hint when it is conclusive. Only an
    /// iterator of unknown length is advanced by one item to find out; that
    /// item is kept and handed to the next claim.
    pub fn has_remaining(&self) -> bool {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let remaining = match cursor.size_hint() {
            (lower, _) if lower > 0 => true,
            (_, Some(0)) => false,
            _ => cursor.peek().is_some(),
        };
        if !remaining {
            self.exhausted.store(true, Ordering::Release);
        }
        remaining
    }

    /// Stop handing out items. Items already claimed are unaffected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether a claim has found the underlying iterator empty.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }

    /// Number of items claimed so far.
    pub fn claimed(&self) -> usize {
        self.claimed.load(Ordering::Acquire)
    }
}

impl<I: Iterator> std::fmt::Debug for WorkSequence<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkSequence")
            .field("claimed", &self.claimed())
            .field("exhausted", &self.is_exhausted())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_claims_in_input_order() {
        let sequence = WorkSequence::new(vec!['a', 'b', 'c']);

        assert_eq!(sequence.claim(), Some((0, 'a')));
        assert_eq!(sequence.claim(), Some((1, 'b')));
        assert_eq!(sequence.claim(), Some((2, 'c')));
        assert!(!sequence.is_exhausted());
        assert!(!sequence.has_remaining());

        assert_eq!(sequence.claim(), None);
        assert!(sequence.is_exhausted());
        assert_eq!(sequence.claimed(), 3);
    }

    #[test]
    fn test_empty_sequence() {
        let sequence = WorkSequence::new(Vec::<u8>::new());
        assert_eq!(sequence.claim(), None);
        assert!(sequence.is_exhausted());
        assert_eq!(sequence.claimed(), 0);
    }

    #[test]
    fn test_close_stops_claims() {
        let sequence = WorkSequence::new(1..=5);
        assert_eq!(sequence.claim(), Some((0, 1)));

        sequence.close();
        assert!(sequence.is_closed());
        assert_eq!(sequence.claim(), None);
        assert!(!sequence.is_exhausted());
        assert!(sequence.has_remaining());
        assert_eq!(sequence.claimed(), 1);
    }

    #[test]
    fn test_has_remaining_does_not_build_items() {
        let built = AtomicUsize::new(0);
        let sequence = WorkSequence::new((0..4).map(|n| {
            built.fetch_add(1, Ordering::SeqCst);
            n
        }));

        assert_eq!(sequence.claim(), Some((0, 0)));
        assert_eq!(sequence.claim(), Some((1, 1)));
        assert!(sequence.has_remaining());
        assert_eq!(built.load(Ordering::SeqCst), 2);

        assert_eq!(sequence.claim(), Some((2, 2)));
        assert_eq!(sequence.claim(), Some((3, 3)));
        assert!(!sequence.has_remaining());
        assert_eq!(built.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_has_remaining_with_unknown_length_keeps_peeked_item() {
        let sequence = WorkSequence::new((0..6).filter(|n| n % 2 == 0));

        assert_eq!(sequence.claim(), Some((0, 0)));
        assert!(sequence.has_remaining());
        assert_eq!(sequence.claim(), Some((1, 2)));
        assert_eq!(sequence.claim(), Some((2, 4)));
        assert!(!sequence.has_remaining());
        assert!(sequence.is_exhausted());
    }

    #[test]
    fn test_lazy_unbounded_iterator() {
        let sequence = WorkSequence::new((0u64..).map(|n| n * n));
        for expected in 0..100u64 {
            let (index, value) = sequence.claim().unwrap();
            assert_eq!(index as u64, expected);
            assert_eq!(value, expected * expected);
        }
    }

    #[test]
    fn test_concurrent_claims_are_exactly_once() {
        let sequence = Arc::new(WorkSequence::new(0..10_000usize));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sequence = Arc::clone(&sequence);
                std::thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some((index, value)) = sequence.claim() {
                        assert_eq!(index, value);
                        seen.push(index);
                    }
                    seen
                })
            })
            .collect();

        let mut all: Vec<usize> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();

        // Each thread observes its own claims in increasing order.
        all.sort_unstable();
        assert_eq!(all, (0..10_000).collect::<Vec<_>>());
        assert_eq!(sequence.claimed(), 10_000);
    }

    #[test]
    fn test_recovers_from_panicking_iterator() {
        let sequence = Arc::new(WorkSequence::new((0..4).map(|n| {
            if n == 1 {
                panic!("bad item");
            }
            n
        })));

        assert_eq!(sequence.claim(), Some((0, 0)));

        let poisoner = Arc::clone(&sequence);
        let result = std::thread::spawn(move || poisoner.claim()).join();
        assert!(result.is_err());

        // The panicking item never received an index; later items take it.
        assert_eq!(sequence.claim(), Some((1, 2)));
        assert_eq!(sequence.claim(), Some((2, 3)));
        assert_eq!(sequence.claimed(), 3);
    }
}

//! Bounded queue of pending media completions.

use crate::error::MediaError;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Outcome of one asynchronous media operation.
pub type CompletionCode = Result<(), MediaError>;

/// Default queue capacity.
///
/// Sized so that the worst-case fan-out of a single record operation
/// into low-level programs and erases can never fill the queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A bounded FIFO of completion codes.
///
/// The media driver produces into this queue (one entry per accepted
/// program or erase); the pump loop consumes from it in strict enqueue
/// order. The queue is shared between the two sides via `Arc`.
///
/// # Overflow
///
/// Filling the queue is a fatal invariant violation: it means the
/// configured capacity under-estimates the fan-out of a single record
/// operation. Overflow panics rather than dropping or overwriting a
/// completion, because a lost completion deadlocks the pump loop.
#[derive(Debug)]
pub struct CompletionQueue {
    inner: Mutex<VecDeque<CompletionCode>>,
    capacity: usize,
}

impl CompletionQueue {
    /// Creates an empty queue with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends a completion code at the tail.
    ///
    /// # Panics
    ///
    /// Panics if the queue reaches `capacity` entries.
    pub fn push(&self, code: CompletionCode) {
        let mut queue = self.inner.lock();
        queue.push_back(code);
        assert!(
            queue.len() < self.capacity,
            "completion queue overflow: capacity {} cannot absorb the media fan-out",
            self.capacity
        );
    }

    /// Removes and returns the oldest completion code, if any.
    pub fn pop(&self) -> Option<CompletionCode> {
        self.inner.lock().pop_front()
    }

    /// Drains the queue, invoking `on_each` on every code in enqueue order.
    pub fn drain<F>(&self, mut on_each: F)
    where
        F: FnMut(CompletionCode),
    {
        while let Some(code) = self.pop() {
            on_each(code);
        }
    }

    /// Number of pending completions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if no completions are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// The configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;

    #[test]
    fn pop_empty_returns_none() {
        let queue = CompletionQueue::new(4);
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn fifo_order_preserved() {
        let queue = CompletionQueue::new(8);
        queue.push(Ok(()));
        queue.push(Err(MediaError::invalid_argument("first error")));
        queue.push(Ok(()));

        assert_eq!(queue.pop(), Some(Ok(())));
        assert!(matches!(queue.pop(), Some(Err(_))));
        assert_eq!(queue.pop(), Some(Ok(())));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn drain_visits_in_enqueue_order() {
        let queue = CompletionQueue::new(8);
        queue.push(Ok(()));
        queue.push(Err(MediaError::invalid_argument("boom")));

        let mut seen = Vec::new();
        queue.drain(|code| seen.push(code.is_ok()));

        assert_eq!(seen, vec![true, false]);
        assert!(queue.is_empty());
    }

    #[test]
    fn below_capacity_never_overflows() {
        let queue = CompletionQueue::new(256);
        for _ in 0..255 {
            queue.push(Ok(()));
        }
        assert_eq!(queue.len(), 255);
    }

    #[test]
    #[should_panic(expected = "completion queue overflow")]
    fn push_at_capacity_panics() {
        let queue = CompletionQueue::new(256);
        for _ in 0..256 {
            queue.push(Ok(()));
        }
    }

    proptest::proptest! {
        #[test]
        fn pop_order_matches_push_order(oks in proptest::collection::vec(
            proptest::prelude::any::<bool>(),
            0..64,
        )) {
            let queue = CompletionQueue::new(128);
            for &ok in &oks {
                queue.push(if ok {
                    Ok(())
                } else {
                    Err(MediaError::invalid_argument("injected"))
                });
            }

            let mut seen = Vec::new();
            while let Some(code) = queue.pop() {
                seen.push(code.is_ok());
            }
            proptest::prop_assert_eq!(seen, oks);
        }
    }
}

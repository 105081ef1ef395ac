// ── Fixed-capacity rolling window ──
//
// Append-only at the tail; overflow evicts from the head. Iteration is
// insertion order, oldest first.

use std::collections::VecDeque;

/// A bounded FIFO that keeps only the most recent `capacity` items.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow<T> {
    buf: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    /// A zero capacity is bumped to one so the newest item is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, returning how many old items were evicted.
    pub fn push(&mut self, item: T) -> usize {
        self.buf.push_back(item);
        let overflow = self.buf.len().saturating_sub(self.capacity);
        self.buf.drain(..overflow);
        overflow
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Most recently pushed item.
    pub fn latest(&self) -> Option<&T> {
        self.buf.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.buf.iter()
    }
}

impl<T: Clone> RollingWindow<T> {
    /// Copy out the window, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.buf.iter().cloned().collect()
    }
}

impl<T> Extend<T> for RollingWindow<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

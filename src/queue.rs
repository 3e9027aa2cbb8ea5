//! A bounded circular queue over caller-owned storage.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::error::QueueError;

/// A fixed-capacity FIFO queue storing up to `storage.len()` elements.
///
/// The queue borrows its storage and never allocates. Pushing into a full
/// queue is refused rather than overwriting the oldest element.
///
/// # Empty and full
///
/// `read == write` holds both when the queue is empty and when it holds
/// exactly `capacity` elements. The `full` flag tells the two apart.
///
/// Draining the last element resets both positions to zero, so a queue that
/// is emptied regularly keeps its contents contiguous from index 0.
pub struct CircularQueue<'a, T> {
    data: &'a mut [T],
    /// Where the next pop reads.
    ///
    /// The queue always guarantees `read < capacity`.
    read: usize,
    /// Where the next push writes.
    ///
    /// The queue always guarantees `write < capacity`.
    write: usize,
    /// Set iff the queue holds `capacity` elements.
    full: bool,
}

impl<'a, T: Copy> CircularQueue<'a, T> {
    /// Creates an empty queue whose capacity is `storage.len()`.
    ///
    /// The previous contents of `storage` are ignored.
    pub fn new(storage: &'a mut [T]) -> Result<Self, QueueError> {
        if storage.is_empty() {
            return Err(QueueError::ZeroCapacity);
        }
        Ok(Self {
            data: storage,
            read: 0,
            write: 0,
            full: false,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_positions(storage: &'a mut [T], read: usize, write: usize) -> Self {
        Self {
            data: storage,
            read,
            write,
            full: false,
        }
    }

    /// Maximum number of elements.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of staged elements.
    #[inline]
    pub fn len(&self) -> usize {
        if self.full {
            self.capacity()
        } else if self.write >= self.read {
            self.write - self.read
        } else {
            self.capacity() - self.read + self.write
        }
    }

    /// Returns `true` if nothing is staged.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.full && self.read == self.write
    }

    /// Returns `true` if a push would be refused.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Appends `value`, or hands it back if the queue is full.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<(), T> {
        if self.full {
            return Err(value);
        }
        self.data[self.write] = value;
        self.write = (self.write + 1) % self.capacity();
        self.full = self.write == self.read;
        Ok(())
    }

    /// Removes and returns the oldest element.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.data[self.read];
        self.read = (self.read + 1) % self.capacity();
        self.full = false;
        if self.read == self.write {
            self.reset();
        }
        Some(value)
    }

    /// Returns the element `offset` places behind the oldest one without
    /// removing anything.
    ///
    /// `None` means fewer than `offset + 1` elements are staged. A staged zero
    /// is `Some(0)`.
    #[inline]
    pub fn peek(&self, offset: usize) -> Option<T> {
        if offset >= self.len() {
            return None;
        }
        Some(self.data[(self.read + offset) % self.capacity()])
    }

    /// Drops up to `n` of the oldest elements, returning how many were
    /// dropped.
    pub fn advance(&mut self, n: usize) -> usize {
        let n = n.min(self.len());
        for _ in 0..n {
            self.pop();
        }
        n
    }

    /// Empties the queue and moves both positions back to index 0.
    #[inline]
    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
        self.full = false;
    }
}

/// A [`CircularQueue`] that can be shared between an interrupt handler and
/// thread-mode code.
///
/// Every operation runs inside its own critical section, so each one is atomic
/// with respect to the others. Sequences of operations are not; use
/// [`SharedQueue::with`] to group them.
pub struct SharedQueue<'a, T> {
    inner: Mutex<RefCell<CircularQueue<'a, T>>>,
}

impl<'a, T: Copy> SharedQueue<'a, T> {
    /// Wraps `queue`.
    pub const fn new(queue: CircularQueue<'a, T>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(queue)),
        }
    }

    /// Runs `f` on the queue inside one critical section.
    pub fn with<R>(&self, f: impl FnOnce(&mut CircularQueue<'a, T>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// See [`CircularQueue::push`].
    pub fn push(&self, value: T) -> Result<(), T> {
        self.with(|q| q.push(value))
    }

    /// See [`CircularQueue::pop`].
    pub fn pop(&self) -> Option<T> {
        self.with(|q| q.pop())
    }

    /// See [`CircularQueue::peek`].
    pub fn peek(&self, offset: usize) -> Option<T> {
        self.with(|q| q.peek(offset))
    }

    /// See [`CircularQueue::len`].
    pub fn len(&self) -> usize {
        self.with(|q| q.len())
    }

    /// See [`CircularQueue::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.with(|q| q.is_empty())
    }

    /// See [`CircularQueue::reset`].
    pub fn reset(&self) {
        self.with(|q| q.reset())
    }

    /// Returns the wrapped queue.
    pub fn into_inner(self) -> CircularQueue<'a, T> {
        self.inner.into_inner().into_inner()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CAPACITY: usize = 4;

    #[test]
    fn zero_capacity_is_rejected() {
        let mut storage: [u32; 0] = [];
        assert!(matches!(
            CircularQueue::new(&mut storage),
            Err(QueueError::ZeroCapacity)
        ));
    }

    #[test]
    fn fill_then_drain_keeps_order() {
        let mut storage = [0u32; CAPACITY];
        let mut q = CircularQueue::new(&mut storage).unwrap();
        for v in 1..=4 {
            q.push(v).unwrap();
        }
        assert!(q.is_full());
        assert_eq!(q.len(), CAPACITY);
        for v in 1..=4 {
            assert_eq!(q.pop(), Some(v));
        }
        assert_eq!(q.pop(), None);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn push_when_full_is_refused() {
        let mut storage = [0u32; CAPACITY];
        let mut q = CircularQueue::new(&mut storage).unwrap();
        for v in 1..=4 {
            q.push(v).unwrap();
        }
        assert_eq!(q.push(5), Err(5));
        assert_eq!(q.len(), CAPACITY);
        assert_eq!(q.peek(0), Some(1));
        assert_eq!(q.peek(3), Some(4));
    }

    #[test]
    fn pop_from_full_frees_one_slot() {
        let mut storage = [0u32; CAPACITY];
        let mut q = CircularQueue::new(&mut storage).unwrap();
        for v in 1..=4 {
            q.push(v).unwrap();
        }
        assert_eq!(q.len(), 4);
        assert_eq!(q.push(5), Err(5));
        assert_eq!(q.len(), 4);

        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.len(), 3);
        assert!(!q.is_full());

        assert_eq!(q.push(5), Ok(()));
        assert_eq!(q.len(), 4);
        for v in 2..=5 {
            assert_eq!(q.pop(), Some(v));
        }
    }

    #[test]
    fn drain_resets_positions() {
        let mut storage = [0u32; CAPACITY];
        let mut q = CircularQueue::new(&mut storage).unwrap();
        q.push(7).unwrap();
        q.push(8).unwrap();
        q.pop();
        q.pop();
        assert_eq!((q.read, q.write, q.full), (0, 0, false));

        q.push(9).unwrap();
        assert_eq!(q.data[0], 9);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn wraps_past_the_end() {
        let mut storage = [0u32; CAPACITY];
        let mut q = CircularQueue::with_positions(&mut storage, CAPACITY - 1, CAPACITY - 1);
        q.push(1).unwrap();
        q.push(2).unwrap();
        q.push(3).unwrap();
        assert_eq!(q.write, 2);
        assert_eq!(q.len(), 3);
        assert_eq!(q.peek(1), Some(2));

        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.read, 0);
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert!(q.is_empty());
        assert_eq!((q.read, q.write), (0, 0));
    }

    #[test]
    fn fills_when_starting_mid_buffer() {
        let mut storage = [0u32; CAPACITY];
        let mut q = CircularQueue::with_positions(&mut storage, 2, 2);
        for v in 1..=4 {
            q.push(v).unwrap();
        }
        assert!(q.is_full());
        assert_eq!(q.read, q.write);
        assert_eq!(q.push(5), Err(5));
        for v in 1..=4 {
            assert_eq!(q.pop(), Some(v));
        }
        assert!(q.is_empty());
    }

    #[test]
    fn single_slot_queue() {
        let mut storage = [0u32; 1];
        let mut q = CircularQueue::new(&mut storage).unwrap();
        assert_eq!(q.pop(), None);
        q.push(0).unwrap();
        assert!(q.is_full());
        assert_eq!(q.push(1), Err(1));
        assert_eq!(q.pop(), Some(0));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn peek_tells_zero_from_nothing() {
        let mut storage = [0xFFu8; CAPACITY];
        let mut q = CircularQueue::new(&mut storage).unwrap();
        q.push(0).unwrap();
        assert_eq!(q.peek(0), Some(0));
        assert_eq!(q.peek(1), None);
        assert_eq!(q.peek(CAPACITY), None);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn advance_drops_oldest() {
        let mut storage = [0u8; CAPACITY];
        let mut q = CircularQueue::new(&mut storage).unwrap();
        for v in [1, 2, 3] {
            q.push(v).unwrap();
        }
        assert_eq!(q.advance(2), 2);
        assert_eq!(q.peek(0), Some(3));
        assert_eq!(q.advance(10), 1);
        assert!(q.is_empty());
        assert_eq!(q.advance(1), 0);
    }

    #[test]
    fn reset_discards_everything() {
        let mut storage = [0u8; CAPACITY];
        let mut q = CircularQueue::new(&mut storage).unwrap();
        for v in 0..4 {
            q.push(v).unwrap();
        }
        q.reset();
        assert!(q.is_empty());
        assert!(!q.is_full());
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn shared_queue_round_trip() {
        let mut storage = [0u8; CAPACITY];
        let shared = SharedQueue::new(CircularQueue::new(&mut storage).unwrap());
        shared.push(1).unwrap();
        shared.push(2).unwrap();
        assert_eq!(shared.len(), 2);
        assert_eq!(shared.peek(1), Some(2));
        assert_eq!(shared.pop(), Some(1));
        assert_eq!(shared.with(|q| q.advance(5)), 1);
        assert!(shared.is_empty());

        shared.push(3).unwrap();
        let q = shared.into_inner();
        assert_eq!(q.peek(0), Some(3));
    }
}

//! Fixed-capacity FIFO with value semantics and an optional per-slot
//! destructor, invoked when a slot is overwritten and again (on every live
//! slot) when the buffer itself is dropped.
//!
//! This is deliberately a plain, single-threaded container — callers that
//! need to share one across tasks wrap it in a `Mutex`/`RwLock` themselves,
//! the same way the framerate estimator and frame history do.

use std::collections::VecDeque;

/// A fixed-capacity ring buffer of `T`, oldest-first.
///
/// Unlike a generic `VecDeque` wrapper, [`RingBuffer::append`] never grows
/// past `capacity`: once full, the oldest element is dropped to make room
/// for the new one. An optional `on_evict` closure observes the evicted
/// value before it is discarded, standing in for the original's
/// destructor-callback slot.
pub struct RingBuffer<T> {
    capacity: usize,
    slots: VecDeque<T>,
    on_evict: Option<Box<dyn FnMut(T) + Send>>,
}

impl<T> RingBuffer<T> {
    /// Create a buffer of the given capacity with no eviction callback.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be greater than 0");
        Self {
            capacity,
            slots: VecDeque::with_capacity(capacity),
            on_evict: None,
        }
    }

    /// Create a buffer whose evicted (overwritten) values are passed to
    /// `on_evict` before being dropped.
    pub fn with_destructor<F>(capacity: usize, on_evict: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        assert!(capacity > 0, "ring buffer capacity must be greater than 0");
        Self {
            capacity,
            slots: VecDeque::with_capacity(capacity),
            on_evict: Some(Box::new(on_evict)),
        }
    }

    /// Append a value, evicting the oldest one first if the buffer is
    /// already at capacity. The destructor, if any, only fires for a slot
    /// that genuinely held a live value — an empty buffer being filled for
    /// the first time never invokes it.
    pub fn append(&mut self, value: T) {
        if self.slots.len() == self.capacity {
            if let Some(evicted) = self.slots.pop_front() {
                if let Some(on_evict) = self.on_evict.as_mut() {
                    on_evict(evicted);
                }
            }
        }
        self.slots.push_back(value);
    }

    /// The oldest element still held, if any.
    pub fn oldest(&self) -> Option<&T> {
        self.slots.front()
    }

    /// The most recently appended element, if any.
    pub fn newest(&self) -> Option<&T> {
        self.slots.back()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.slots.len()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.slots.iter()
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        if let Some(on_evict) = self.on_evict.as_mut() {
            while let Some(value) = self.slots.pop_front() {
                on_evict(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn used_saturates_at_capacity() {
        let mut rb = RingBuffer::new(3);
        for v in 1..=5 {
            rb.append(v);
        }
        assert_eq!(rb.used(), 3);
        assert_eq!(rb.capacity(), 3);
    }

    #[test]
    fn oldest_and_newest_track_wraparound() {
        let mut rb = RingBuffer::new(3);
        rb.append(1);
        rb.append(2);
        assert_eq!(rb.oldest(), Some(&1));
        assert_eq!(rb.newest(), Some(&2));

        rb.append(3);
        rb.append(4); // evicts 1
        assert_eq!(rb.oldest(), Some(&2));
        assert_eq!(rb.newest(), Some(&4));
    }

    #[test]
    fn empty_buffer_has_no_oldest_or_newest() {
        let rb: RingBuffer<i32> = RingBuffer::new(4);
        assert_eq!(rb.oldest(), None);
        assert_eq!(rb.newest(), None);
    }

    /// Mirrors the end-to-end scenario in the testable-properties table:
    /// capacity 3, append 1..=5, then drop. With destructor-on-real-overwrite
    /// semantics this yields 2 evictions (appends 4 and 5) plus 3 final
    /// drops of the still-live slots — 5 invocations total, not 6 (see
    /// DESIGN.md for why this implementation diverges from the literal
    /// source behavior here).
    #[test]
    fn destructor_invocation_count_matches_chosen_semantics() {
        let count = Rc::new(RefCell::new(0));
        {
            let count = Rc::clone(&count);
            let mut rb = RingBuffer::with_destructor(3, move |_v: i32| {
                *count.borrow_mut() += 1;
            });
            for v in 1..=5 {
                rb.append(v);
            }
            assert_eq!(*count.borrow(), 2);
        }
        assert_eq!(*count.borrow(), 5);
    }

    #[test]
    fn never_evicted_before_reaching_capacity() {
        let count = Rc::new(RefCell::new(0));
        {
            let count = Rc::clone(&count);
            let mut rb = RingBuffer::with_destructor(3, move |_v: i32| {
                *count.borrow_mut() += 1;
            });
            rb.append(1);
            rb.append(2);
            assert_eq!(*count.borrow(), 0);
        }
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn iter_is_oldest_first() {
        let mut rb = RingBuffer::new(3);
        rb.append(1);
        rb.append(2);
        rb.append(3);
        rb.append(4);
        let items: Vec<_> = rb.iter().copied().collect();
        assert_eq!(items, vec![2, 3, 4]);
    }
}

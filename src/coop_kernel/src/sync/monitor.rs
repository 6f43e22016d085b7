use spin::Mutex as SpinMutex;
use std::fmt;

use super::{condition::Condition, lock::Lock};
use crate::System;

/// A bounded FIFO buffer guarded by a monitor.
///
/// [`Self::insert`] blocks while the buffer is full and [`Self::remove`]
/// blocks while it is empty.
///
/// The waiting side is signalled only when the buffer leaves the empty (or
/// full) state, so at most one blocked consumer (or producer) is woken per
/// transition. With several consumers waiting on an empty buffer, a later
/// consumer stays blocked until another transition occurs.
pub struct BoundedBuffer<T> {
    name: String,
    lock: Lock,
    /// Signalled when the buffer stops being empty.
    not_empty: Condition,
    /// Signalled when the buffer stops being full.
    not_full: Condition,
    ring: SpinMutex<Ring<T>>,
}

struct Ring<T> {
    slots: Box<[Option<T>]>,
    count: usize,
    in_index: usize,
    out_index: usize,
}

impl<T> Ring<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    fn push(&mut self, item: T) {
        debug_assert!(!self.is_full());
        debug_assert!(self.slots[self.in_index].is_none());
        self.slots[self.in_index] = Some(item);
        self.in_index = (self.in_index + 1) % self.capacity();
        self.count += 1;
    }

    fn pop(&mut self) -> Option<T> {
        let item = self.slots[self.out_index].take()?;
        self.out_index = (self.out_index + 1) % self.capacity();
        self.count -= 1;
        Some(item)
    }
}

impl<T: Send> BoundedBuffer<T> {
    /// Construct a buffer that holds up to `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[track_caller]
    pub fn new(system: &System, name: &str, capacity: usize) -> Self {
        assert!(capacity > 0, "bounded buffer {name:?} must have a non-zero capacity");
        Self {
            name: name.to_owned(),
            lock: Lock::new(system, &format!("{name}.lock")),
            not_empty: Condition::new(system, &format!("{name}.not_empty")),
            not_full: Condition::new(system, &format!("{name}.not_full")),
            ring: SpinMutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                count: 0,
                in_index: 0,
                out_index: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append `item`, waiting for a free slot if the buffer is full.
    pub fn insert(&self, item: T) {
        self.lock.acquire();

        while self.ring.lock().is_full() {
            self.not_full.wait(&self.lock);
        }

        let was_empty = {
            let mut ring = self.ring.lock();
            ring.push(item);
            ring.count == 1
        };
        if was_empty {
            self.not_empty.signal(&self.lock);
        }

        self.lock.release();
    }

    /// Take the oldest item, waiting for one if the buffer is empty.
    pub fn remove(&self) -> T {
        self.lock.acquire();

        let (item, was_full) = loop {
            let mut ring = self.ring.lock();
            if let Some(item) = ring.pop() {
                break (item, ring.count + 1 == ring.capacity());
            }
            drop(ring);
            self.not_empty.wait(&self.lock);
        };
        if was_full {
            self.not_full.signal(&self.lock);
        }

        self.lock.release();
        item
    }

    /// The number of items in the buffer.
    pub fn len(&self) -> usize {
        self.ring.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }
}

impl<T> fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ring = self.ring.lock();
        f.debug_struct("BoundedBuffer")
            .field("name", &self.name)
            .field("count", &ring.count)
            .field("capacity", &ring.capacity())
            .finish_non_exhaustive()
    }
}

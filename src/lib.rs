//! Bounded circular buffer shared by many producers and many consumers.
//!
//! `mring` ("monitor ring") is a fixed-capacity circular buffer guarded by a
//! single mutex and two condition variables.  Any number of producers may
//! call [`BoundedBuffer::put`] and any number of consumers may call
//! [`BoundedBuffer::take`] concurrently.  A producer blocks while the buffer
//! is full and a consumer blocks while it is empty; each side wakes one
//! waiter of the other side after it changes the occupancy.  Items come out
//! in exactly the order they went in, no matter which thread inserted or
//! removed them.
//!
//! The buffer is not lock-free.  Every access to its state happens with the
//! lock held, and a blocked caller sleeps on a condition variable (which
//! releases the lock) instead of spinning.
//!
//! The [`driver`] module launches a configurable set of producer and
//! consumer threads against one buffer; the `producer-consumer` binary is a
//! command-line front end for it.

#[cfg(all(feature = "loom", test))]
use loom::sync::{Condvar, Mutex, MutexGuard};
#[cfg(not(all(feature = "loom", test)))]
use std::sync::{Condvar, Mutex, MutexGuard};

use core::fmt;
use log::trace;

pub mod driver;

const POISONED: &str = "bounded buffer lock poisoned by a panic inside put/take";

/// Errors reported when building a buffer or a driver run.
///
/// Broken internal invariants are never reported through this type; they
/// panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("buffer capacity must be at least 1")]
    ZeroCapacity,
    #[error("at least one producer is required")]
    NoProducers,
    #[error("at least one consumer is required")]
    NoConsumers,
    #[error("total item count overflows usize")]
    TooManyItems,
}

/// A `BoundedBuffer<T>` holds up to `capacity` items of type `T` in a
/// circular array.  It is shared by reference (or through an `Arc`) between
/// all of its producers and consumers, and is `Sync` whenever `T: Send`.
///
/// The capacity is fixed at construction.  There is no way to resize the
/// buffer, to wait with a timeout, or to cancel a blocked call.
pub struct BoundedBuffer<T = u8> {
    capacity: usize,
    state: Mutex<State<T>>,
    space_available: Condvar, // producers wait here while the buffer is full
    item_available: Condvar,  // consumers wait here while the buffer is empty
}

struct State<T> {
    slots: Box<[Option<T>]>,
    count: usize,
    write_index: usize, // next slot to be written
    read_index: usize,  // next slot to be read
    // Both indices stay in `0..capacity`.  The gap from `read_index` forward
    // to `write_index` (mod capacity) is `count`, except that a full buffer
    // has `write_index == read_index` just like an empty one.  A slot is
    // `Some` exactly when it lies inside that gap.
}

impl<T> State<T> {
    fn check_indices(&self, capacity: usize) {
        debug_assert!(self.count <= capacity);
        debug_assert!(self.write_index < capacity && self.read_index < capacity);
        debug_assert_eq!(
            (self.write_index + capacity - self.read_index) % capacity,
            self.count % capacity
        );
    }
}

impl<T> BoundedBuffer<T> {
    /// Return a new, empty buffer with room for `capacity` items.
    ///
    /// Fails with [`Error::ZeroCapacity`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::ZeroCapacity);
        }
        let slots = (0..capacity).map(|_| None).collect();
        Ok(BoundedBuffer {
            capacity,
            state: Mutex::new(State {
                slots,
                count: 0,
                write_index: 0,
                read_index: 0,
            }),
            space_available: Condvar::new(),
            item_available: Condvar::new(),
        })
    }

    /// Insert `item` at the back of the buffer, blocking while it is full.
    ///
    /// When this returns, the item is visible to exactly one later
    /// [`take`](Self::take), and one consumer blocked on an empty buffer (if
    /// any) has been woken.
    ///
    /// # Panics
    ///
    /// Panics if the buffer's internal state is found to be inconsistent, or
    /// if another caller panicked while holding the buffer's lock.
    pub fn put(&self, item: T) {
        let mut state = self.lock();
        while state.count >= self.capacity {
            trace!("put: full (count={}), waiting for space", state.count);
            state = self.space_available.wait(state).expect(POISONED);
            trace!("put: woke (count={})", state.count);
        }
        assert!(
            state.count < self.capacity,
            "put: occupancy {} not below capacity {} after waiting",
            state.count,
            self.capacity
        );

        let index = state.write_index;
        let previous = state.slots[index].replace(item);
        assert!(
            previous.is_none(),
            "put: slot {index} overwritten before it was read"
        );
        state.write_index = (index + 1) % self.capacity;
        state.count += 1;
        state.check_indices(self.capacity);

        trace!(
            "put: stored slot {index}, signalling item available (count={})",
            state.count
        );
        self.item_available.notify_one();
    }

    /// Remove and return the item at the front of the buffer, blocking while
    /// it is empty.
    ///
    /// The returned item is the least recently inserted one that has not yet
    /// been taken.  One producer blocked on a full buffer (if any) is woken.
    ///
    /// # Panics
    ///
    /// Panics if the buffer's internal state is found to be inconsistent, or
    /// if another caller panicked while holding the buffer's lock.
    pub fn take(&self) -> T {
        let mut state = self.lock();
        while state.count == 0 {
            trace!("take: empty, waiting for an item");
            state = self.item_available.wait(state).expect(POISONED);
            trace!("take: woke (count={})", state.count);
        }
        assert!(
            state.count > 0 && state.count <= self.capacity,
            "take: occupancy {} outside 1..={} after waiting",
            state.count,
            self.capacity
        );

        let index = state.read_index;
        let item = match state.slots[index].take() {
            Some(item) => item,
            None => panic!("take: slot {index} read before it was written"),
        };
        state.read_index = (index + 1) % self.capacity;
        state.count -= 1;
        state.check_indices(self.capacity);

        trace!(
            "take: emptied slot {index}, signalling space available (count={})",
            state.count
        );
        self.space_available.notify_one();
        item
    }

    /// Return the fixed number of slots in the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Return the number of items currently stored in the buffer.  Other
    /// threads may change this as soon as the call returns.
    pub fn len(&self) -> usize {
        self.lock().count
    }

    /// Return `true` if the buffer held no items at the time of the call.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return `true` if the buffer was full at the time of the call, so that
    /// a `put` would have blocked.
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().expect(POISONED)
    }
}

/// Prints the capacity, occupancy and both indices, but not the items.
impl<T> fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("BoundedBuffer");
        d.field("capacity", &self.capacity);
        match self.state.lock() {
            Ok(state) => d
                .field("count", &state.count)
                .field("write_index", &state.write_index)
                .field("read_index", &state.read_index),
            Err(_) => d.field("state", &"<poisoned>"),
        };
        d.finish()
    }
}

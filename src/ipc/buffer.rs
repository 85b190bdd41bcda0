/*!
 * Circular Buffer
 * Fixed-capacity slot array with independent read and write cursors
 */

use std::num::NonZeroUsize;

/// Circular buffer of `capacity` slots
///
/// Not synchronized: callers serialize access (the bounded buffer does so
/// with its `mutex` semaphore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularBuffer<T> {
    slots: Vec<Option<T>>,
    write: usize,
    read: usize,
    occupied: usize,
}

impl<T> CircularBuffer<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity.get()).collect(),
            write: 0,
            read: 0,
            occupied: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots currently holding an item
    #[inline]
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.occupied == self.slots.len()
    }

    #[inline]
    pub fn write_cursor(&self) -> usize {
        self.write
    }

    #[inline]
    pub fn read_cursor(&self) -> usize {
        self.read
    }

    /// Store `item` at the write cursor and advance it; returns the slot used
    ///
    /// The slot must be free, which holding an `empty` permit guarantees.
    pub fn put(&mut self, item: T) -> usize {
        let slot = self.write;
        debug_assert!(self.slots[slot].is_none(), "write into occupied slot {}", slot);

        if self.slots[slot].replace(item).is_none() {
            self.occupied += 1;
        }
        self.write = (self.write + 1) % self.slots.len();
        slot
    }

    /// Take the item at the read cursor, mark the slot empty and advance
    ///
    /// Returns the slot index and its item (`None` if the slot was empty).
    pub fn take(&mut self) -> (usize, Option<T>) {
        let slot = self.read;
        let item = self.slots[slot].take();
        if item.is_some() {
            self.occupied -= 1;
        }
        self.read = (self.read + 1) % self.slots.len();
        (slot, item)
    }

    /// Empty every slot and rewind both cursors
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.write = 0;
        self.read = 0;
        self.occupied = 0;
    }
}

impl<T: Clone> CircularBuffer<T> {
    /// Copy of every slot
    pub fn contents(&self) -> Vec<Option<T>> {
        self.slots.clone()
    }
}

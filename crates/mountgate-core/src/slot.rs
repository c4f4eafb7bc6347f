//! Bounded pool of per-invocation scratch slots.
//!
//! Every intercepted call frame takes one slot for the whole entry → body →
//! return sequence, so the pool's capacity is the number of frames that can
//! be inside the hooked function at once (concurrently or recursively).
//! Acquisition never blocks. When every slot is taken the caller is told to
//! skip the hook and the miss is counted.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

/// Fixed-capacity arena of `T` slots.
#[derive(Debug)]
pub struct SlotPool<T> {
    slots: Box<[Mutex<T>]>,
    missed: AtomicU64,
}

impl<T: Default> SlotPool<T> {
    /// Creates a pool with `capacity` slots, each starting at `T::default()`.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Mutex::new(T::default())).collect(),
            missed: AtomicU64::new(0),
        }
    }

    /// Takes a free slot, or counts a miss and returns `None` if the pool is
    /// exhausted.
    pub fn acquire(&self) -> Option<Slot<'_, T>> {
        for (index, cell) in self.slots.iter().enumerate() {
            let guard = match cell.try_lock() {
                Ok(guard) => guard,
                // A frame unwound while holding this slot; it was reset on drop.
                Err(TryLockError::Poisoned(poisoned)) => {
                    cell.clear_poison();
                    poisoned.into_inner()
                }
                Err(TryLockError::WouldBlock) => continue,
            };
            return Some(Slot { index, guard });
        }
        let _ = self.missed.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Acquisitions that found the pool exhausted.
    pub fn missed(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }
}

/// Exclusive access to one slot. Dropping it resets the slot and returns it
/// to the pool.
#[derive(Debug)]
pub struct Slot<'a, T: Default> {
    index: usize,
    guard: MutexGuard<'a, T>,
}

impl<T: Default> Slot<'_, T> {
    /// Position of this slot in the pool; identifies the call frame holding it.
    pub const fn index(&self) -> usize {
        self.index
    }
}

impl<T: Default> Deref for Slot<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T: Default> DerefMut for Slot<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: Default> Drop for Slot<'_, T> {
    fn drop(&mut self) {
        *self.guard = T::default();
    }
}

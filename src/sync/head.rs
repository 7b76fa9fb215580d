//! A spin-locked cell guarding the head state of a primitive.
//!
//! Every producer keeps its whole state machine behind one of these cells.
//! Critical sections are short (a list push, a state swap); callbacks and
//! executor dispatch always happen after the guard is released.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::Backoff;

/// Set while a thread is inside the critical section.
const LOCKED: usize = 1;

/// A mutual-exclusion cell over `T` with a spinning acquire path.
pub(crate) struct HeadCell<T> {
    /// Holds the `LOCKED` bit.
    flag: AtomicUsize,

    /// The guarded state.
    inner: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for HeadCell<T> {}
unsafe impl<T: Send> Sync for HeadCell<T> {}

impl<T> HeadCell<T> {
    /// Creates a new cell holding `value`.
    pub fn new(value: T) -> HeadCell<T> {
        HeadCell {
            flag: AtomicUsize::new(0),
            inner: UnsafeCell::new(value),
        }
    }

    /// Runs `f` with exclusive access to the state and returns its result.
    ///
    /// `f` must not dispatch onto executors or invoke callbacks.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// Acquires the lock.
    fn lock(&self) -> Lock<'_, T> {
        let backoff = Backoff::new();
        while self.flag.fetch_or(LOCKED, Ordering::Acquire) & LOCKED != 0 {
            backoff.snooze();
        }
        Lock { cell: self }
    }
}

/// A guard holding a `HeadCell` locked.
struct Lock<'a, T> {
    cell: &'a HeadCell<T>,
}

impl<T> Drop for Lock<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.cell.flag.store(0, Ordering::Release);
    }
}

impl<T> Deref for Lock<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.cell.inner.get() }
    }
}

impl<T> DerefMut for Lock<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.cell.inner.get() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_increments() {
        let cell = Arc::new(HeadCell::new(0u64));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let cell = cell.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    cell.update(|n| *n += 1);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cell.update(|n| *n), 8000);
    }
}

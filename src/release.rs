//! A LIFO pool that keeps objects alive until a primitive resolves.

use std::any::Any;
use std::fmt;

use crate::sync::HeadCell;

/// Items are either plain objects or drain-notification hooks.
enum Item {
    Release(Box<dyn Any + Send>),
    Notify(Box<dyn FnOnce() + Send>),
}

enum State {
    Open(Vec<Item>),
    Drained,
}

/// A last-in-first-out list of owned objects, drained when its owner resolves.
///
/// A release pool is how a combinator keeps its upstream subscription alive:
/// the upstream [`Handler`] is inserted into the downstream's pool, so the
/// subscription lives exactly as long as the downstream is observed. Draining
/// releases items in reverse insertion order; inserting into a drained pool
/// releases the item immediately.
///
/// [`Handler`]: crate::handler::Handler
pub struct ReleasePool {
    state: HeadCell<State>,
}

impl ReleasePool {
    /// Creates an empty pool.
    pub fn new() -> ReleasePool {
        ReleasePool {
            state: HeadCell::new(State::Open(Vec::new())),
        }
    }

    /// Takes ownership of `obj` until the pool is drained.
    pub fn insert(&self, obj: impl Any + Send) {
        self.park(Item::Release(Box::new(obj)));
    }

    /// Registers a hook that fires when the pool drains.
    ///
    /// On an already-drained pool the hook fires immediately.
    pub fn notify_drain(&self, f: impl FnOnce() + Send + 'static) {
        self.park(Item::Notify(Box::new(f)));
    }

    fn park(&self, item: Item) {
        let rejected = self.state.update(|state| match state {
            State::Open(items) => {
                items.push(item);
                None
            }
            State::Drained => Some(item),
        });

        // Released outside the critical section.
        if let Some(item) = rejected {
            release(item);
        }
    }

    /// Releases all items in reverse insertion order.
    ///
    /// Draining twice is a no-op.
    pub fn drain(&self) {
        let items = self.state.update(|state| match state {
            State::Open(items) => {
                let items = std::mem::take(items);
                *state = State::Drained;
                Some(items)
            }
            State::Drained => None,
        });

        if let Some(mut items) = items {
            while let Some(item) = items.pop() {
                release(item);
            }
        }
    }
}

fn release(item: Item) {
    match item {
        Item::Release(obj) => drop(obj),
        Item::Notify(f) => f(),
    }
}

impl Default for ReleasePool {
    fn default() -> ReleasePool {
        ReleasePool::new()
    }
}

impl fmt::Debug for ReleasePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("ReleasePool { .. }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Tracked(Arc<AtomicUsize>, usize);

    impl Drop for Tracked {
        fn drop(&mut self) {
            // Record the position at which this item was released.
            self.0.fetch_max(self.1, Ordering::SeqCst);
        }
    }

    #[test]
    fn drains_in_reverse_insertion_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let pool = ReleasePool::new();

        for i in 0..3 {
            let order = order.clone();
            pool.notify_drain(move || order.lock().unwrap().push(i));
        }

        pool.drain();
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn drained_pool_releases_immediately() {
        let pool = ReleasePool::new();
        pool.drain();
        pool.drain();

        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        pool.notify_drain(move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let dropped = Arc::new(AtomicUsize::new(0));
        pool.insert(Tracked(dropped.clone(), 1));
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }
}

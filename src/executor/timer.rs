//! The timer thread behind `execute_after`.
//!
//! Delayed tasks are parked in a binary heap keyed by deadline. A single
//! thread sleeps until the earliest deadline, then re-dispatches the task
//! onto its recorded executor. Tasks with equal deadlines fire in submission
//! order.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use crate::executor::{Executor, Task};
use crate::utils::abort_on_panic;

struct Entry {
    at: Instant,
    seq: u64,
    executor: Executor,
    task: Task,
}

// Ordered so that the earliest deadline is the greatest entry, turning the
// max-heap into a min-heap. Ties break toward the lower sequence number.
impl Ord for Entry {
    fn cmp(&self, other: &Entry) -> CmpOrdering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Entry) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Entry) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Entry {}

struct Timer {
    entries: Mutex<Entries>,
    wake: Condvar,
}

struct Entries {
    heap: BinaryHeap<Entry>,
    seq: u64,
}

static TIMER: Lazy<Timer> = Lazy::new(|| {
    log::trace!("starting timer thread");

    thread::Builder::new()
        .name("relay/timer".to_string())
        .spawn(|| abort_on_panic(main_loop))
        .expect("cannot start the timer thread");

    Timer {
        entries: Mutex::new(Entries {
            heap: BinaryHeap::new(),
            seq: 0,
        }),
        wake: Condvar::new(),
    }
});

/// Parks `task` until at least `delay` has passed, then submits it to `executor`.
pub(super) fn submit(delay: Duration, executor: Executor, task: Task) {
    let at = Instant::now() + delay;

    let mut entries = TIMER.entries.lock().unwrap();
    let seq = entries.seq;
    entries.seq += 1;
    entries.heap.push(Entry {
        at,
        seq,
        executor,
        task,
    });
    drop(entries);

    // The new entry may be the earliest; recompute the sleep.
    TIMER.wake.notify_one();
}

fn main_loop() {
    let mut entries = TIMER.entries.lock().unwrap();

    loop {
        let now = Instant::now();

        match entries.heap.peek().map(|e| e.at) {
            None => {
                entries = TIMER.wake.wait(entries).unwrap();
            }
            Some(at) if at <= now => {
                let entry = entries.heap.pop().unwrap();
                // Dispatch without holding the heap lock.
                drop(entries);
                entry.executor.submit(entry.task);
                entries = TIMER.entries.lock().unwrap();
            }
            Some(at) => {
                let (guard, _) = TIMER.wake.wait_timeout(entries, at - now).unwrap();
                entries = guard;
            }
        }
    }
}

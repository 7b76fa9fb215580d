//! The work-stealing pool behind the primary executor.
//!
//! Submissions always land in one shared injector; workers move batches from
//! it into their own deque and steal from each other once both run dry. An
//! idle worker spins briefly and then parks on a counting wakeup gate, so a
//! quiet pool costs no CPU.

use std::sync::{Condvar, Mutex};
use std::thread;

use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use crossbeam_utils::Backoff;
use once_cell::sync::Lazy;

use crate::executor::{run_contained, Task};
use crate::utils::abort_on_panic;

/// Everything the workers share.
struct Pool {
    /// All submissions funnel through here.
    injector: Injector<Task>,

    /// Steal handles onto each worker's deque, indexed by worker id.
    stealers: Vec<Stealer<Task>>,

    /// The gate idle workers sleep behind.
    gate: Gate,
}

static POOL: Lazy<Pool> = Lazy::new(|| {
    let count = num_cpus::get().max(1);
    log::trace!("primary executor starting {} workers", count);

    let deques: Vec<Worker<Task>> = (0..count).map(|_| Worker::new_fifo()).collect();
    let stealers = deques.iter().map(Worker::stealer).collect();

    for (id, deque) in deques.into_iter().enumerate() {
        thread::Builder::new()
            .name(format!("relay/worker-{}", id))
            .spawn(move || abort_on_panic(|| work(id, deque)))
            .expect("cannot start a thread driving tasks");
    }

    Pool {
        injector: Injector::new(),
        stealers,
        gate: Gate::new(count),
    }
});

/// Hands `task` to the pool and wakes a worker for it.
pub(crate) fn schedule(task: Task) {
    POOL.injector.push(task);
    POOL.gate.open_one();
}

/// A worker's life: run tasks while any can be found, park otherwise.
fn work(id: usize, deque: Worker<Task>) {
    let pool = &*POOL;
    let mut backoff = Backoff::new();

    loop {
        match next_task(pool, id, &deque) {
            Some(task) => {
                run_contained(task);
                backoff = Backoff::new();
            }
            None if backoff.is_completed() => {
                pool.gate.wait();
                backoff = Backoff::new();
            }
            None => backoff.snooze(),
        }
    }
}

/// Own deque first, then the injector, then the other workers.
///
/// Sibling deques are visited in ring order starting just past the worker's
/// own slot, so contention spreads without any randomness. A `Retry` from any
/// source means a steal raced us; rescan until every source settles.
fn next_task(pool: &Pool, id: usize, deque: &Worker<Task>) -> Option<Task> {
    if let Some(task) = deque.pop() {
        return Some(task);
    }

    loop {
        let mut contended = false;

        match pool.injector.steal_batch_and_pop(deque) {
            Steal::Success(task) => return Some(task),
            Steal::Retry => contended = true,
            Steal::Empty => {}
        }

        let count = pool.stealers.len();
        for sibling in (1..count).map(|offset| &pool.stealers[(id + offset) % count]) {
            match sibling.steal_batch_and_pop(deque) {
                Steal::Success(task) => return Some(task),
                Steal::Retry => contended = true,
                Steal::Empty => {}
            }
        }

        if !contended {
            return None;
        }
    }
}

/// A counting wakeup gate.
///
/// `open_one` banks a wakeup; `wait` consumes one, sleeping only when none
/// are banked. Banking is what closes the race where a task arrives while a
/// worker is between its last scan and falling asleep: the worker finds the
/// banked wakeup and goes back for another scan instead. Banked wakeups are
/// capped at the worker count, which bounds the number of no-op rescans a
/// busy spell can cause.
struct Gate {
    state: Mutex<GateState>,
    wake: Condvar,
    capacity: usize,
}

struct GateState {
    /// Workers asleep on the condvar.
    sleeping: usize,

    /// Wakeups issued with no one awake to take them, up to `capacity`.
    banked: usize,
}

impl Gate {
    fn new(capacity: usize) -> Gate {
        Gate {
            state: Mutex::new(GateState {
                sleeping: 0,
                banked: 0,
            }),
            wake: Condvar::new(),
            capacity,
        }
    }

    /// Blocks until a wakeup is available, then consumes it.
    fn wait(&self) {
        let mut state = self.state.lock().unwrap();

        if state.banked > 0 {
            state.banked -= 1;
            return;
        }

        state.sleeping += 1;
        loop {
            state = self.wake.wait(state).unwrap();

            // Ignore spurious wakeups: leave only with a wakeup in hand.
            if state.banked > 0 {
                state.banked -= 1;
                state.sleeping -= 1;
                return;
            }
        }
    }

    /// Banks one wakeup and rouses a sleeper if there is one.
    fn open_one(&self) {
        let mut state = self.state.lock().unwrap();

        if state.banked < self.capacity {
            state.banked += 1;
        }
        if state.sleeping > 0 {
            self.wake.notify_one();
        }
    }
}

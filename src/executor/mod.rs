//! Execution contexts that callbacks are dispatched onto.
//!
//! An [`Executor`] is a cheap-to-clone handle to something that runs boxed
//! tasks: the global work-stealing pool, a serial queue, the caller's own
//! thread, or a user-supplied scheduler. Producers record an executor per
//! subscription and dispatch every callback through it.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;

mod pool;
mod queue;
mod timer;

use queue::Queue;

/// A boxed unit of work submitted to an executor.
pub struct Task(Box<dyn FnOnce() + Send>);

impl Task {
    pub(crate) fn new(f: impl FnOnce() + Send + 'static) -> Task {
        Task(Box::new(f))
    }

    /// Runs the task, consuming it.
    pub fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("Task { .. }")
    }
}

/// A user-supplied scheduler backing an [`Executor`].
///
/// Implementations must be callable from any thread. Delayed execution is
/// provided by the library's timer, which re-submits the task through
/// [`schedule`](Schedule::schedule) once the deadline passes.
pub trait Schedule: Send + Sync {
    /// Schedules `task` to run later, possibly on another thread.
    fn schedule(&self, task: Task);
}

#[derive(Clone)]
enum Kind {
    Immediate,
    Primary,
    Queue(Arc<Queue>),
    Custom(Arc<dyn Schedule>),
}

/// The global serial queue behind [`Executor::main`].
static MAIN: Lazy<Arc<Queue>> = Lazy::new(|| Arc::new(Queue::new("relay/main", 1)));

/// A handle to an execution context.
///
/// Executors have no observable identity beyond the tasks they run. Within a
/// single serial executor, tasks run in submission order; across executors
/// there are no ordering guarantees.
///
/// # Examples
///
/// ```
/// use relay::Executor;
///
/// let (tx, rx) = std::sync::mpsc::channel();
/// Executor::primary().execute(move || tx.send(1 + 1).unwrap());
/// assert_eq!(rx.recv().unwrap(), 2);
/// ```
#[derive(Clone)]
pub struct Executor {
    kind: Kind,
}

impl Executor {
    /// The default background pool, shared by the whole process.
    ///
    /// Tasks run concurrently on a work-stealing pool with one worker per
    /// logical CPU.
    pub fn primary() -> Executor {
        Executor {
            kind: Kind::Primary,
        }
    }

    /// The global serial queue.
    ///
    /// Tasks run one at a time in submission order on a dedicated thread.
    pub fn main() -> Executor {
        Executor {
            kind: Kind::Queue(MAIN.clone()),
        }
    }

    /// Runs tasks synchronously, inline on the caller's thread.
    ///
    /// Combinators subscribe upstream with this executor so their transforms
    /// do not cross a thread hop.
    pub fn immediate() -> Executor {
        Executor {
            kind: Kind::Immediate,
        }
    }

    /// Creates a fresh serial queue with its own worker thread.
    ///
    /// When the last handle to the queue is dropped, already-submitted tasks
    /// are drained and the worker exits.
    pub fn serial() -> Executor {
        Executor {
            kind: Kind::Queue(Arc::new(Queue::new("relay/serial", 1))),
        }
    }

    /// Creates a fresh pool of `threads` workers sharing one task queue.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is zero.
    pub fn concurrent(threads: usize) -> Executor {
        assert!(threads > 0, "cannot create an executor with zero threads");
        Executor {
            kind: Kind::Queue(Arc::new(Queue::new("relay/concurrent", threads))),
        }
    }

    /// Wraps a caller-supplied scheduler.
    pub fn from_scheduler(scheduler: impl Schedule + 'static) -> Executor {
        Executor {
            kind: Kind::Custom(Arc::new(scheduler)),
        }
    }

    /// Schedules `f` to run on this executor.
    pub fn execute(&self, f: impl FnOnce() + Send + 'static) {
        self.submit(Task::new(f));
    }

    /// Schedules `f` to run after at least `delay` of wall-clock time.
    ///
    /// A zero delay submits immediately. The task is parked on the library's
    /// timer thread and re-dispatched onto this executor once due; for the
    /// [`immediate`](Executor::immediate) executor that means it runs on the
    /// timer thread itself.
    pub fn execute_after(&self, delay: Duration, f: impl FnOnce() + Send + 'static) {
        if delay.is_zero() {
            self.execute(f);
        } else {
            timer::submit(delay, self.clone(), Task::new(f));
        }
    }

    pub(crate) fn submit(&self, task: Task) {
        match &self.kind {
            Kind::Immediate => task.run(),
            Kind::Primary => pool::schedule(task),
            Kind::Queue(q) => q.push(task),
            Kind::Custom(s) => s.schedule(task),
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.kind {
            Kind::Immediate => "Immediate",
            Kind::Primary => "Primary",
            Kind::Queue(_) => "Queue",
            Kind::Custom(_) => "Custom",
        };
        f.debug_tuple("Executor").field(&name).finish()
    }
}

/// Runs a task on a worker thread, containing panics from user callbacks.
pub(crate) fn run_contained(task: Task) {
    if panic::catch_unwind(AssertUnwindSafe(|| task.run())).is_err() {
        log::error!("a task panicked; the worker thread keeps running");
    }
}

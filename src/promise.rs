//! The write face of a single-value asynchronous result.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::cancel::{AsCancellable, Cancellable, CancellationToken};
use crate::error::Error;
use crate::executor::Executor;
use crate::fallible::Fallible;
use crate::future::Future;
use crate::handler::{Handler, HandlerInner};
use crate::release::ReleasePool;
use crate::sync::HeadCell;

/// The head of a promise: a subscriber list or the terminal value.
pub(crate) enum State<T> {
    Idle,
    Subscribed(Vec<Weak<HandlerInner<Fallible<T>>>>),
    Completed(Fallible<T>),
}

/// State shared between a [`Promise`] and its [`Future`]s.
pub(crate) struct Shared<T> {
    pub(crate) state: HeadCell<State<T>>,
    pub(crate) pool: ReleasePool,
}

impl<T: Clone + Send + 'static> Shared<T> {
    pub(crate) fn new() -> Arc<Shared<T>> {
        Arc::new(Shared {
            state: HeadCell::new(State::Idle),
            pool: ReleasePool::new(),
        })
    }

    /// Registers a handler, or schedules it immediately if already completed.
    pub(crate) fn subscribe(
        this: &Arc<Shared<T>>,
        executor: &Executor,
        callback: impl Fn(Fallible<T>) + Send + Sync + 'static,
    ) -> Handler<Fallible<T>> {
        let handler = HandlerInner::new(executor.clone(), callback);

        let completed = this.state.update(|state| match state {
            State::Completed(value) => Some(value.clone()),
            State::Idle => {
                *state = State::Subscribed(vec![Arc::downgrade(&handler)]);
                None
            }
            State::Subscribed(list) => {
                // Prune entries whose handlers were dropped.
                list.retain(|w| w.strong_count() > 0);
                list.push(Arc::downgrade(&handler));
                None
            }
        });

        if let Some(value) = completed {
            handler.push(value);
        }

        Handler {
            inner: handler,
            source: this.clone(),
        }
    }

    /// Transitions to the terminal state. At most one call returns `true`.
    pub(crate) fn complete(&self, value: Fallible<T>) -> bool {
        let subscribers = self.state.update(|state| match state {
            State::Completed(_) => None,
            _ => {
                let old = std::mem::replace(state, State::Completed(value.clone()));
                Some(match old {
                    State::Subscribed(list) => list,
                    _ => Vec::new(),
                })
            }
        });

        match subscribers {
            None => false,
            Some(list) => {
                log::trace!("promise completed ({} subscribers)", list.len());
                for weak in list {
                    if let Some(handler) = weak.upgrade() {
                        handler.push(value.clone());
                    }
                }
                self.pool.drain();
                true
            }
        }
    }

    pub(crate) fn completion(&self) -> Option<Fallible<T>> {
        self.state.update(|state| match state {
            State::Completed(value) => Some(value.clone()),
            _ => None,
        })
    }
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Nobody can observe this primitive anymore; let go of everything the
        // pool was keeping alive.
        self.pool.drain();
    }
}

impl<T: Clone + Send + 'static> Cancellable for Shared<T> {
    fn cancel(&self) {
        self.complete(Fallible::Failure(Error::Cancelled));
    }
}

/// The write face of a [`Future`].
///
/// A promise transitions to its terminal value at most once; every
/// subscriber, early or late, observes that value exactly once.
///
/// # Examples
///
/// ```
/// use relay::{Executor, Promise};
///
/// let p = Promise::new();
/// let (tx, rx) = std::sync::mpsc::channel();
///
/// let _h = p.future().on_success(&Executor::immediate(), move |n: i32| {
///     tx.send(n).unwrap();
/// });
///
/// p.succeed(7);
/// assert_eq!(rx.recv().unwrap(), 7);
/// ```
pub struct Promise<T> {
    pub(crate) shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Creates an empty promise.
    pub fn new() -> Promise<T> {
        Promise {
            shared: Shared::new(),
        }
    }

    /// Returns the read face of this promise.
    pub fn future(&self) -> Future<T> {
        Future {
            shared: self.shared.clone(),
        }
    }

    /// Completes the promise with `value`.
    ///
    /// Returns `true` iff this call caused the transition; later calls (and
    /// racing calls that lost) return `false` and leave the stored value
    /// untouched.
    pub fn try_complete(&self, value: Fallible<T>) -> bool {
        self.shared.complete(value)
    }

    /// Completes with a success value.
    pub fn succeed(&self, value: T) -> bool {
        self.try_complete(Fallible::Success(value))
    }

    /// Completes with a failure.
    pub fn fail(&self, err: Error) -> bool {
        self.try_complete(Fallible::Failure(err))
    }

    /// Fails the promise with [`Error::Cancelled`].
    pub fn cancel(&self) -> bool {
        self.try_complete(Fallible::Failure(Error::Cancelled))
    }

    /// Returns the terminal value, if the promise has completed.
    pub fn completion(&self) -> Option<Fallible<T>> {
        self.shared.completion()
    }

    /// Keeps `obj` alive until the promise completes.
    pub fn retain(&self, obj: impl std::any::Any + Send) {
        self.shared.pool.insert(obj);
    }
}

impl<T: Clone + Send + 'static> Default for Promise<T> {
    fn default() -> Promise<T> {
        Promise::new()
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Promise<T> {
        Promise {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> AsCancellable for Promise<T> {
    fn as_cancellable(&self) -> Weak<dyn Cancellable> {
        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        weak
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("Promise { .. }")
    }
}

/// Configures how a promise-producing function is run.
///
/// This is the manual-completion constructor: `f` receives the promise and
/// completes it whenever it is ready.
///
/// # Examples
///
/// ```
/// use relay::{promise, Executor};
///
/// let fut = promise::Builder::new()
///     .executor(Executor::primary())
///     .run(|p: &relay::Promise<i32>| {
///         p.succeed(5);
///     });
///
/// let (tx, rx) = std::sync::mpsc::channel();
/// let _h = fut.on_success(&Executor::immediate(), move |n| tx.send(n).unwrap());
/// assert_eq!(rx.recv().unwrap(), 5);
/// ```
#[derive(Debug)]
pub struct Builder {
    executor: Executor,
    after: Duration,
    token: Option<CancellationToken>,
}

impl Builder {
    /// Creates a builder with the `immediate` executor and no delay.
    pub fn new() -> Builder {
        Builder {
            executor: Executor::immediate(),
            after: Duration::ZERO,
            token: None,
        }
    }

    /// Configures the executor `f` runs on.
    pub fn executor(mut self, executor: Executor) -> Builder {
        self.executor = executor;
        self
    }

    /// Delays running `f` by `after`.
    pub fn after(mut self, after: Duration) -> Builder {
        self.after = after;
        self
    }

    /// Registers the promise on `token` before `f` runs.
    pub fn token(mut self, token: CancellationToken) -> Builder {
        self.token = Some(token);
        self
    }

    /// Runs `f` with a fresh promise and returns the matching future.
    pub fn run<T: Clone + Send + 'static>(
        self,
        f: impl FnOnce(&Promise<T>) + Send + 'static,
    ) -> Future<T> {
        let promise = Promise::new();
        if let Some(token) = &self.token {
            token.add(&promise);
        }

        let inner = promise.clone();
        self.executor
            .execute_after(self.after, move || f(&inner));

        promise.future()
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

/// Runs `f` with a fresh promise on the context's executor.
///
/// If `ctx` is dropped before `f` runs, the future fails with
/// [`Error::ContextDropped`].
pub fn with_context<C, T>(
    ctx: &Arc<C>,
    f: impl FnOnce(&C, &Promise<T>) + Send + 'static,
) -> Future<T>
where
    C: crate::context::Context,
    T: Clone + Send + 'static,
{
    let promise = Promise::new();
    let inner = promise.clone();
    let weak = Arc::downgrade(ctx);

    ctx.executor().execute(move || match weak.upgrade() {
        Some(ctx) => f(&ctx, &inner),
        None => {
            inner.fail(Error::ContextDropped);
        }
    });

    promise.future()
}

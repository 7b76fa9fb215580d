//! The read face of a single-value asynchronous result.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::cancel::{AsCancellable, Cancellable};
use crate::context::{contextual, Context};
use crate::error::Error;
use crate::executor::Executor;
use crate::fallible::Fallible;
use crate::handler::Handler;
use crate::promise::{Promise, Shared};

mod delay;
mod join_all;
mod timeout;
mod zip;

/// A value that becomes available later.
///
/// A future is the read face of a [`Promise`]: it can be subscribed to and
/// inspected, never completed. Subscribing after completion still delivers
/// the terminal value, scheduled on the subscription's executor.
///
/// # Examples
///
/// ```
/// use relay::{future, Executor};
///
/// let fut = future::value(2).map(|n| n + 1).map(|n| n * 10);
///
/// let (tx, rx) = std::sync::mpsc::channel();
/// let _h = fut.on_success(&Executor::immediate(), move |n| tx.send(n).unwrap());
/// assert_eq!(rx.recv().unwrap(), 30);
/// ```
pub struct Future<T> {
    pub(crate) shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Registers `callback` to receive the terminal value on `executor`.
    ///
    /// The returned [`Handler`] owns the subscription; dropping it
    /// unsubscribes.
    pub fn on_complete(
        &self,
        executor: &Executor,
        callback: impl Fn(Fallible<T>) + Send + Sync + 'static,
    ) -> Handler<Fallible<T>> {
        Shared::subscribe(&self.shared, executor, callback)
    }

    /// Like [`on_complete`](Future::on_complete), but only for successes.
    pub fn on_success(
        &self,
        executor: &Executor,
        callback: impl Fn(T) + Send + Sync + 'static,
    ) -> Handler<Fallible<T>> {
        self.on_complete(executor, move |result| {
            if let Fallible::Success(value) = result {
                callback(value);
            }
        })
    }

    /// Like [`on_complete`](Future::on_complete), but only for failures.
    pub fn on_failure(
        &self,
        executor: &Executor,
        callback: impl Fn(Error) + Send + Sync + 'static,
    ) -> Handler<Fallible<T>> {
        self.on_complete(executor, move |result| {
            if let Fallible::Failure(err) = result {
                callback(err);
            }
        })
    }

    /// Contextual subscription: `callback` runs on the context's executor and
    /// is severed silently if `ctx` is dropped first.
    pub fn on_complete_with<C: Context>(
        &self,
        ctx: &Arc<C>,
        callback: impl Fn(&C, Fallible<T>) + Send + Sync + 'static,
    ) -> Handler<Fallible<T>> {
        let executor = ctx.executor();
        let (callback, slot) = contextual(ctx, callback);
        let handler = self.on_complete(&executor, callback);
        let _ = slot.set(Arc::downgrade(&handler.inner));
        handler
    }

    /// Returns the terminal value without blocking, if there is one.
    pub fn completion(&self) -> Option<Fallible<T>> {
        self.shared.completion()
    }

    /// Transforms the success value; failures pass through unchanged.
    pub fn map<U: Clone + Send + 'static>(
        &self,
        f: impl Fn(T) -> U + Send + Sync + 'static,
    ) -> Future<U> {
        self.pipe(move |result| result.map(|v| f(v)))
    }

    /// Transforms the success value with a fallible function.
    ///
    /// An `Err` becomes the downstream failure.
    pub fn try_map<U: Clone + Send + 'static>(
        &self,
        f: impl Fn(T) -> Result<U, Error> + Send + Sync + 'static,
    ) -> Future<U> {
        self.pipe(move |result| result.try_map(|v| f(v)))
    }

    /// Transforms the whole completion, success or failure.
    pub fn map_completion<U: Clone + Send + 'static>(
        &self,
        f: impl Fn(Fallible<T>) -> Fallible<U> + Send + Sync + 'static,
    ) -> Future<U> {
        self.pipe(f)
    }

    /// Converts an upstream failure into a success; successes pass through.
    pub fn recover(&self, f: impl Fn(Error) -> T + Send + Sync + 'static) -> Future<T> {
        self.pipe(move |result| result.recover(|e| f(e)))
    }

    /// Completes with both values once `self` and `other` both succeed, or
    /// with the first failure.
    pub fn zip<B: Clone + Send + 'static>(&self, other: &Future<B>) -> Future<(T, B)> {
        zip::zip(self, other)
    }

    /// Fails with [`Error::Timeout`] if no completion arrives within `dur`.
    pub fn timeout(&self, dur: Duration) -> Future<T> {
        timeout::timeout(self, dur)
    }

    /// Re-delivers the completion after an extra `dur`.
    pub fn delay(&self, dur: Duration) -> Future<T> {
        delay::delay(self, dur)
    }

    fn pipe<U: Clone + Send + 'static>(
        &self,
        f: impl Fn(Fallible<T>) -> Fallible<U> + Send + Sync + 'static,
    ) -> Future<U> {
        let promise = Promise::new();

        // The callback holds the downstream weakly; the only strong path to
        // it runs through whoever still observes the downstream, so dropping
        // every downstream handle tears the chain down.
        let weak = Arc::downgrade(&promise.shared);
        let handler = self.on_complete(&Executor::immediate(), move |result| {
            if let Some(shared) = weak.upgrade() {
                shared.complete(f(result));
            }
        });

        // The upstream subscription lives until the downstream resolves.
        promise.retain(handler);
        promise.future()
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Future<T> {
        Future {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> AsCancellable for Future<T> {
    fn as_cancellable(&self) -> Weak<dyn Cancellable> {
        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        weak
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("Future { .. }")
    }
}

/// Creates a future that is already completed with `value`.
pub fn ready<T: Clone + Send + 'static>(value: Fallible<T>) -> Future<T> {
    let promise = Promise::new();
    promise.try_complete(value);
    promise.future()
}

/// Creates a future that is already completed with a success.
///
/// # Examples
///
/// ```
/// use relay::{future, Fallible};
///
/// assert_eq!(future::value(7).completion(), Some(Fallible::Success(7)));
/// ```
pub fn value<T: Clone + Send + 'static>(value: T) -> Future<T> {
    ready(Fallible::Success(value))
}

/// Runs `f` on `executor` and completes the future with its result.
pub fn spawn<T: Clone + Send + 'static>(
    executor: &Executor,
    f: impl FnOnce() -> Result<T, Error> + Send + 'static,
) -> Future<T> {
    let promise = Promise::new();
    let inner = promise.clone();

    executor.execute(move || {
        inner.try_complete(f().into());
    });

    promise.future()
}

/// Runs `f` on `executor` after at least `delay`, completing with its result.
pub fn spawn_after<T: Clone + Send + 'static>(
    executor: &Executor,
    delay: Duration,
    f: impl FnOnce() -> Result<T, Error> + Send + 'static,
) -> Future<T> {
    let promise = Promise::new();
    let inner = promise.clone();

    executor.execute_after(delay, move || {
        inner.try_complete(f().into());
    });

    promise.future()
}

/// Runs `f` against a weakly-held context on the context's executor.
///
/// Fails with [`Error::ContextDropped`] if `ctx` is dropped before `f` runs.
pub fn with_context<C, T>(
    ctx: &Arc<C>,
    f: impl FnOnce(&C) -> Result<T, Error> + Send + 'static,
) -> Future<T>
where
    C: Context,
    T: Clone + Send + 'static,
{
    let promise = Promise::new();
    let inner = promise.clone();
    let weak = Arc::downgrade(ctx);

    ctx.executor().execute(move || match weak.upgrade() {
        Some(ctx) => {
            inner.try_complete(f(&ctx).into());
        }
        None => {
            inner.fail(Error::ContextDropped);
        }
    });

    promise.future()
}

/// Completes with every success in input order, or with the first failure.
///
/// An empty input completes immediately with an empty vector.
pub fn join_all<T: Clone + Send + 'static>(
    futures: impl IntoIterator<Item = Future<T>>,
) -> Future<Vec<T>> {
    join_all::join_all(futures.into_iter().collect())
}

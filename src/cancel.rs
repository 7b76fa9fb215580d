//! Fan-out cancellation signals.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::sync::HeadCell;

/// Anything that can be cancelled.
///
/// Cancelling must be idempotent; a second call is a no-op.
pub trait Cancellable: Send + Sync {
    /// Cancels the operation.
    fn cancel(&self);
}

/// Types that can hand out a weak reference to a [`Cancellable`].
///
/// Implemented by [`Promise`], [`Future`], [`Producer`], [`Channel`], and
/// [`Handler`], so any of them can be registered on a token directly.
///
/// [`Promise`]: crate::promise::Promise
/// [`Future`]: crate::future::Future
/// [`Producer`]: crate::channel::Producer
/// [`Channel`]: crate::channel::Channel
/// [`Handler`]: crate::handler::Handler
pub trait AsCancellable {
    /// Returns a weak reference to the underlying cancellable.
    fn as_cancellable(&self) -> Weak<dyn Cancellable>;
}

impl<C: Cancellable + 'static> AsCancellable for Arc<C> {
    fn as_cancellable(&self) -> Weak<dyn Cancellable> {
        let weak: Weak<C> = Arc::downgrade(self);
        weak
    }
}

enum State {
    Active(Vec<Weak<dyn Cancellable>>),
    Cancelled,
}

struct Inner {
    state: HeadCell<State>,
}

/// A one-shot signal fanned out to weakly-held subscribers.
///
/// Subscribers added after the token fired are cancelled immediately. The
/// token holds only weak references, so registering on a token never extends
/// a subscriber's lifetime.
///
/// # Examples
///
/// ```
/// use relay::{CancellationToken, Error, Promise};
///
/// let p = Promise::<i32>::new();
/// let token = CancellationToken::new();
/// token.add(&p);
/// token.cancel();
///
/// assert_eq!(p.completion().unwrap().err(), Some(Error::Cancelled));
/// ```
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Creates a token that has not fired.
    pub fn new() -> CancellationToken {
        CancellationToken {
            inner: Arc::new(Inner {
                state: HeadCell::new(State::Active(Vec::new())),
            }),
        }
    }

    /// Registers `target` to be cancelled when the token fires.
    pub fn add(&self, target: &impl AsCancellable) {
        self.add_weak(target.as_cancellable());
    }

    /// Registers a weak cancellable directly.
    pub fn add_weak(&self, target: Weak<dyn Cancellable>) {
        let fire_now = self.inner.state.update(|state| match state {
            State::Active(targets) => {
                // Prune entries whose owners are gone.
                targets.retain(|w| w.strong_count() > 0);
                targets.push(target.clone());
                false
            }
            State::Cancelled => true,
        });

        if fire_now {
            if let Some(target) = target.upgrade() {
                target.cancel();
            }
        }
    }

    /// Registers a closure to run when the token fires.
    ///
    /// The returned guard owns the registration; dropping it unregisters.
    pub fn on_cancel(&self, f: impl Fn() + Send + Sync + 'static) -> CancelHook {
        let hook = Arc::new(FnCancellable(Box::new(f)));
        self.add(&hook);
        CancelHook { _inner: hook }
    }

    /// Fires the token.
    ///
    /// Every live subscriber is cancelled exactly once; calling this again is
    /// a no-op.
    pub fn cancel(&self) {
        let targets = self.inner.state.update(|state| match state {
            State::Active(targets) => {
                let targets = std::mem::take(targets);
                *state = State::Cancelled;
                Some(targets)
            }
            State::Cancelled => None,
        });

        if let Some(targets) = targets {
            log::trace!("cancellation token fired ({} subscribers)", targets.len());
            for weak in targets {
                if let Some(target) = weak.upgrade() {
                    target.cancel();
                }
            }
        }
    }

    /// Returns `true` once the token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner
            .state
            .update(|state| matches!(state, State::Cancelled))
    }
}

impl Default for CancellationToken {
    fn default() -> CancellationToken {
        CancellationToken::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("is_cancelled", &self.is_cancelled())
            .finish()
    }
}

struct FnCancellable(Box<dyn Fn() + Send + Sync>);

impl Cancellable for FnCancellable {
    fn cancel(&self) {
        (self.0)();
    }
}

/// Owns a closure registration made with [`CancellationToken::on_cancel`].
pub struct CancelHook {
    _inner: Arc<FnCancellable>,
}

impl fmt::Debug for CancelHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("CancelHook { .. }")
    }
}

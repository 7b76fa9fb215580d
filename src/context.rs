//! Weakly-held owners for contextual operations.

use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;

use crate::executor::Executor;
use crate::handler::HandlerInner;

/// An owner that contextual operations are tied to.
///
/// A contextual subscription or constructor holds its context weakly: if the
/// context is dropped first, a constructor fails with
/// [`Error::ContextDropped`] and a subscription silently severs itself.
/// The context also supplies the default executor for its callbacks.
///
/// [`Error::ContextDropped`]: crate::Error::ContextDropped
pub trait Context: Send + Sync + 'static {
    /// The executor contextual callbacks run on by default.
    fn executor(&self) -> Executor {
        Executor::primary()
    }
}

/// Wraps `f` so it runs against a weakly-held context.
///
/// The returned slot must be filled with the handler created from the
/// callback; once the context dies the callback cancels that handler instead
/// of running.
pub(crate) fn contextual<C: Context, E: Send + 'static>(
    ctx: &Arc<C>,
    f: impl Fn(&C, E) + Send + Sync + 'static,
) -> (
    impl Fn(E) + Send + Sync + 'static,
    Arc<OnceCell<Weak<HandlerInner<E>>>>,
) {
    let weak_ctx = Arc::downgrade(ctx);
    let slot: Arc<OnceCell<Weak<HandlerInner<E>>>> = Arc::new(OnceCell::new());
    let cb_slot = slot.clone();

    let callback = move |event: E| match weak_ctx.upgrade() {
        Some(ctx) => f(&ctx, event),
        None => {
            if let Some(handler) = cb_slot.get().and_then(Weak::upgrade) {
                use crate::cancel::Cancellable;
                handler.cancel();
            }
        }
    };

    (callback, slot)
}

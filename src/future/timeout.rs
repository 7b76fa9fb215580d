use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::executor::Executor;
use crate::fallible::Fallible;
use crate::future::Future;
use crate::promise::Promise;

pub(super) fn timeout<T: Clone + Send + 'static>(
    upstream: &Future<T>,
    dur: Duration,
) -> Future<T> {
    let promise = Promise::new();

    let weak = Arc::downgrade(&promise.shared);
    let handler = upstream.on_complete(&Executor::immediate(), move |result| {
        if let Some(shared) = weak.upgrade() {
            shared.complete(result);
        }
    });
    promise.retain(handler);

    // The timer entry also holds the promise weakly, so an early completion
    // can free the value before the deadline.
    let weak = Arc::downgrade(&promise.shared);
    Executor::immediate().execute_after(dur, move || {
        if let Some(shared) = weak.upgrade() {
            shared.complete(Fallible::Failure(Error::Timeout));
        }
    });

    promise.future()
}

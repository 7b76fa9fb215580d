use std::sync::Arc;
use std::time::Duration;

use crate::executor::Executor;
use crate::future::Future;
use crate::promise::Promise;

pub(super) fn delay<T: Clone + Send + 'static>(upstream: &Future<T>, dur: Duration) -> Future<T> {
    let promise = Promise::new();

    let weak = Arc::downgrade(&promise.shared);
    let handler = upstream.on_complete(&Executor::immediate(), move |result| {
        let weak = weak.clone();
        Executor::immediate().execute_after(dur, move || {
            if let Some(shared) = weak.upgrade() {
                shared.complete(result);
            }
        });
    });

    promise.retain(handler);
    promise.future()
}

use std::sync::{Arc, Mutex};

use crate::executor::Executor;
use crate::fallible::Fallible;
use crate::future::Future;
use crate::promise::Promise;

pub(super) fn join_all<T: Clone + Send + 'static>(futures: Vec<Future<T>>) -> Future<Vec<T>> {
    let total = futures.len();
    if total == 0 {
        return crate::future::ready(Fallible::Success(Vec::new()));
    }

    let promise = Promise::new();
    // Successes parked by input position, plus a fill count.
    let slots: Arc<Mutex<(Vec<Option<T>>, usize)>> =
        Arc::new(Mutex::new(((0..total).map(|_| None).collect(), 0)));

    for (i, future) in futures.into_iter().enumerate() {
        let weak = Arc::downgrade(&promise.shared);
        let slots = slots.clone();

        let handler = future.on_complete(&Executor::immediate(), move |result| {
            let shared = match weak.upgrade() {
                Some(shared) => shared,
                None => return,
            };

            match result {
                Fallible::Success(v) => {
                    let done = {
                        let mut guard = slots.lock().unwrap();
                        guard.0[i] = Some(v);
                        guard.1 += 1;
                        if guard.1 == total {
                            Some(guard.0.iter_mut().map(|s| s.take().unwrap()).collect())
                        } else {
                            None
                        }
                    };
                    if let Some(values) = done {
                        shared.complete(Fallible::Success(values));
                    }
                }
                Fallible::Failure(e) => {
                    shared.complete(Fallible::Failure(e));
                }
            }
        });

        promise.retain(handler);
    }

    promise.future()
}

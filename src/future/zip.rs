use std::sync::{Arc, Mutex};

use crate::executor::Executor;
use crate::fallible::Fallible;
use crate::future::Future;
use crate::promise::Promise;

pub(super) fn zip<A, B>(a: &Future<A>, b: &Future<B>) -> Future<(A, B)>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let promise = Promise::new();
    let slots: Arc<Mutex<(Option<A>, Option<B>)>> = Arc::new(Mutex::new((None, None)));

    let left = {
        let weak = Arc::downgrade(&promise.shared);
        let slots = slots.clone();
        a.on_complete(&Executor::immediate(), move |result| {
            let shared = match weak.upgrade() {
                Some(shared) => shared,
                None => return,
            };
            match result {
                Fallible::Success(v) => {
                    let ready = {
                        let mut guard = slots.lock().unwrap();
                        guard.0 = Some(v);
                        take_pair(&mut guard)
                    };
                    if let Some(pair) = ready {
                        shared.complete(Fallible::Success(pair));
                    }
                }
                Fallible::Failure(e) => {
                    shared.complete(Fallible::Failure(e));
                }
            }
        })
    };

    let right = {
        let weak = Arc::downgrade(&promise.shared);
        b.on_complete(&Executor::immediate(), move |result| {
            let shared = match weak.upgrade() {
                Some(shared) => shared,
                None => return,
            };
            match result {
                Fallible::Success(v) => {
                    let ready = {
                        let mut guard = slots.lock().unwrap();
                        guard.1 = Some(v);
                        take_pair(&mut guard)
                    };
                    if let Some(pair) = ready {
                        shared.complete(Fallible::Success(pair));
                    }
                }
                Fallible::Failure(e) => {
                    shared.complete(Fallible::Failure(e));
                }
            }
        })
    };

    promise.retain(left);
    promise.retain(right);
    promise.future()
}

fn take_pair<A, B>(slots: &mut (Option<A>, Option<B>)) -> Option<(A, B)> {
    if slots.0.is_some() && slots.1.is_some() {
        Some((slots.0.take().unwrap(), slots.1.take().unwrap()))
    } else {
        None
    }
}

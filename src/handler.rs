//! Subscription records owned by subscribers, weakly held by producers.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::cancel::{AsCancellable, Cancellable};
use crate::executor::Executor;

/// The callback record behind a subscription.
///
/// Producers hold a `Weak` to this; the subscriber (or a downstream release
/// pool) holds the strong [`Handler`]. Events are appended to the mailbox in
/// production order and drained by at most one executor task at a time, so a
/// single handler observes events in order even on a concurrent executor.
pub(crate) struct HandlerInner<E> {
    executor: Executor,
    callback: Box<dyn Fn(E) + Send + Sync>,

    /// Pending events, in production order.
    mailbox: Mutex<VecDeque<E>>,

    /// Set while a drain task is scheduled or running.
    draining: AtomicBool,

    /// Set once the subscription is severed.
    cancelled: AtomicBool,
}

impl<E: Send + 'static> HandlerInner<E> {
    pub(crate) fn new(
        executor: Executor,
        callback: impl Fn(E) + Send + Sync + 'static,
    ) -> Arc<HandlerInner<E>> {
        Arc::new(HandlerInner {
            executor,
            callback: Box::new(callback),
            mailbox: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Appends an event without scheduling a drain.
    ///
    /// Producers call this inside their head critical section so that mailbox
    /// order matches production order; the lock order is always head cell
    /// first, mailbox second.
    pub(crate) fn enqueue(&self, event: E) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        self.mailbox.lock().unwrap().push_back(event);
    }

    /// Schedules a drain of the mailbox unless one is already in flight.
    pub(crate) fn flush(self: &Arc<Self>) {
        if self.mailbox.lock().unwrap().is_empty() {
            return;
        }
        if !self.draining.swap(true, Ordering::AcqRel) {
            let weak = Arc::downgrade(self);
            self.executor.execute(move || {
                if let Some(handler) = weak.upgrade() {
                    handler.drain();
                }
            });
        }
    }

    /// Appends an event and schedules delivery.
    pub(crate) fn push(self: &Arc<Self>, event: E) {
        self.enqueue(event);
        self.flush();
    }

    fn drain(self: &Arc<Self>) {
        loop {
            let event = self.mailbox.lock().unwrap().pop_front();

            match event {
                Some(event) => {
                    if !self.cancelled.load(Ordering::Acquire) {
                        (self.callback)(event);
                    }
                }
                None => {
                    self.draining.store(false, Ordering::Release);

                    // An event may have slipped in after the final pop; if so,
                    // reclaim the drain and keep going.
                    if self.mailbox.lock().unwrap().is_empty()
                        || self.draining.swap(true, Ordering::AcqRel)
                    {
                        return;
                    }
                }
            }
        }
    }

    fn sever(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.mailbox.lock().unwrap().clear();
    }
}

impl<E: Send + 'static> Cancellable for HandlerInner<E> {
    fn cancel(&self) {
        self.sever();
    }
}

/// A live subscription.
///
/// The handler is the strong side of a subscription: as long as it is alive
/// (held directly, or parked in a downstream's release pool) events reach its
/// callback, and the producer it is subscribed to stays alive. Dropping it
/// severs the subscription; no further events are delivered, including ones
/// already queued.
pub struct Handler<E> {
    pub(crate) inner: Arc<HandlerInner<E>>,

    /// Keeps the subscribed-to producer alive for as long as the
    /// subscription is.
    pub(crate) source: Arc<dyn std::any::Any + Send + Sync>,
}

impl<E: Send + 'static> Handler<E> {
    /// Severs the subscription without dropping the handle.
    pub fn cancel(&self) {
        self.inner.sever();
    }
}

impl<E: Send + 'static> AsCancellable for Handler<E> {
    fn as_cancellable(&self) -> Weak<dyn Cancellable> {
        let weak: Weak<HandlerInner<E>> = Arc::downgrade(&self.inner);
        weak
    }
}

impl<E> Drop for Handler<E> {
    fn drop(&mut self) {
        self.inner.cancelled.store(true, Ordering::Release);
        if let Ok(mut mailbox) = self.inner.mailbox.lock() {
            mailbox.clear();
        }
        // `source` drops afterwards; if this was the last thing keeping the
        // producer alive, its release pool drains now.
    }
}

impl<E> fmt::Debug for Handler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("Handler { .. }")
    }
}

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::channel::{ChanShared, Channel, ChannelEvent, Producer};
use crate::executor::Executor;

struct Pending<U> {
    value: Option<U>,
    sent_first: bool,
}

/// The periodic tick draining coalesced updates.
///
/// Each tick re-arms itself through the timer; the chain ends once the
/// downstream is closed or dropped. An idle tick (nothing pending) re-arms
/// with `leeway` added, trading tick precision for fewer wakeups while the
/// upstream is quiet.
struct Ticker<U, S> {
    pending: Arc<Mutex<Pending<U>>>,
    downstream: Weak<ChanShared<U, S>>,
    interval: Duration,
    leeway: Duration,
}

impl<U, S> Ticker<U, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    fn arm(self: &Arc<Self>, after: Duration) {
        let ticker = self.clone();
        Executor::immediate().execute_after(after, move || ticker.tick());
    }

    fn tick(self: &Arc<Self>) {
        if let Some(shared) = self.downstream.upgrade() {
            if shared.is_closed() {
                return;
            }
            let pending = self.pending.lock().unwrap().value.take();
            match pending {
                Some(u) => {
                    shared.update(u);
                    self.arm(self.interval);
                }
                None => self.arm(self.interval + self.leeway),
            }
        }
    }
}

pub(super) fn debounce<U, S>(
    upstream: &Channel<U, S>,
    interval: Duration,
    leeway: Duration,
    first_after: Duration,
) -> Channel<U, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    let producer = Producer::new(upstream.shared.capacity);
    let pending = Arc::new(Mutex::new(Pending {
        value: None,
        sent_first: false,
    }));

    let state = pending.clone();
    let weak = Arc::downgrade(&producer.shared);
    let handler = upstream.on_event(&Executor::immediate(), move |event| {
        if let Some(shared) = weak.upgrade() {
            match event {
                ChannelEvent::Update(u) => {
                    let mut guard = state.lock().unwrap();
                    if !guard.sent_first {
                        guard.sent_first = true;
                        drop(guard);
                        shared.update(u);
                    } else {
                        guard.value = Some(u);
                    }
                }
                ChannelEvent::Completion(c) => {
                    let flush = state.lock().unwrap().value.take();
                    if let Some(u) = flush {
                        shared.update(u);
                    }
                    shared.close(c);
                }
            }
        }
    });
    producer.retain(handler);

    let ticker = Arc::new(Ticker {
        pending,
        downstream: Arc::downgrade(&producer.shared),
        interval,
        leeway,
    });
    ticker.arm(first_after);

    producer.channel()
}

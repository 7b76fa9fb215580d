use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::channel::{Channel, ChannelEvent, Producer};
use crate::executor::Executor;

pub(super) fn enumerate<U, S>(upstream: &Channel<U, S>) -> Channel<(usize, U), S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    let producer = Producer::new(upstream.shared.capacity);
    let counter = AtomicUsize::new(0);

    let weak = Arc::downgrade(&producer.shared);
    let handler = upstream.on_event(&Executor::immediate(), move |event| {
        if let Some(shared) = weak.upgrade() {
            match event {
                ChannelEvent::Update(u) => {
                    let i = counter.fetch_add(1, Ordering::Relaxed);
                    shared.update((i, u));
                }
                ChannelEvent::Completion(c) => {
                    shared.close(c);
                }
            }
        }
    });

    producer.retain(handler);
    producer.channel()
}

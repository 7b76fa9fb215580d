use std::sync::Arc;
use std::time::Duration;

use crate::channel::{Channel, ChannelEvent, Producer};
use crate::executor::Executor;

pub(super) fn delay<U, S>(upstream: &Channel<U, S>, dur: Duration) -> Channel<U, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    let producer = Producer::new(upstream.shared.capacity);

    // Re-dispatching through the timer preserves order: entries with the same
    // delay fire in submission order, and the inline executor delivers them
    // from the timer thread one at a time.
    let weak = Arc::downgrade(&producer.shared);
    let handler = upstream.on_event(&Executor::immediate(), move |event| {
        let weak = weak.clone();
        Executor::immediate().execute_after(dur, move || {
            if let Some(shared) = weak.upgrade() {
                match event {
                    ChannelEvent::Update(u) => {
                        shared.update(u);
                    }
                    ChannelEvent::Completion(c) => {
                        shared.close(c);
                    }
                }
            }
        });
    });

    producer.retain(handler);
    producer.channel()
}

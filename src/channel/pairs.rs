use std::sync::{Arc, Mutex};

use crate::channel::{Channel, ChannelEvent, Producer};
use crate::executor::Executor;

pub(super) fn pairs<U, S>(upstream: &Channel<U, S>) -> Channel<(U, U), S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    let producer = Producer::new(upstream.shared.capacity);
    let previous: Mutex<Option<U>> = Mutex::new(None);

    let weak = Arc::downgrade(&producer.shared);
    let handler = upstream.on_event(&Executor::immediate(), move |event| {
        if let Some(shared) = weak.upgrade() {
            match event {
                ChannelEvent::Update(u) => {
                    let pair = {
                        let mut prev = previous.lock().unwrap();
                        prev.replace(u.clone()).map(|p| (p, u))
                    };
                    if let Some(pair) = pair {
                        shared.update(pair);
                    }
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

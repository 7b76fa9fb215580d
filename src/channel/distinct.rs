use std::sync::{Arc, Mutex};

use crate::channel::{Channel, ChannelEvent, Producer};
use crate::executor::Executor;

pub(super) fn distinct_by<U, S>(
    upstream: &Channel<U, S>,
    eq: impl Fn(&U, &U) -> bool + Send + Sync + 'static,
) -> Channel<U, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    let producer = Producer::new(upstream.shared.capacity);
    let last: Mutex<Option<U>> = Mutex::new(None);

    let weak = Arc::downgrade(&producer.shared);
    let handler = upstream.on_event(&Executor::immediate(), move |event| {
        if let Some(shared) = weak.upgrade() {
            match event {
                ChannelEvent::Update(u) => {
                    let emit = {
                        let mut last = last.lock().unwrap();
                        let changed = match &*last {
                            None => true,
                            Some(prev) => !eq(prev, &u),
                        };
                        if changed {
                            *last = Some(u.clone());
                        }
                        changed
                    };
                    if emit {
                        shared.update(u);
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

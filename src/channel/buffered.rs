use std::sync::{Arc, Mutex};

use crate::channel::{Channel, ChannelEvent, Producer};
use crate::executor::Executor;

pub(super) fn buffered<U, S>(upstream: &Channel<U, S>, capacity: usize) -> Channel<Vec<U>, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    assert!(capacity > 0, "cannot batch updates into empty batches");

    let producer = Producer::new(upstream.shared.capacity);
    let batch: Mutex<Vec<U>> = Mutex::new(Vec::with_capacity(capacity));

    let weak = Arc::downgrade(&producer.shared);
    let handler = upstream.on_event(&Executor::immediate(), move |event| {
        if let Some(shared) = weak.upgrade() {
            match event {
                ChannelEvent::Update(u) => {
                    let full = {
                        let mut batch = batch.lock().unwrap();
                        batch.push(u);
                        if batch.len() == capacity {
                            Some(std::mem::replace(
                                &mut *batch,
                                Vec::with_capacity(capacity),
                            ))
                        } else {
                            None
                        }
                    };
                    if let Some(full) = full {
                        shared.update(full);
                    }
                }
                ChannelEvent::Completion(c) => {
                    // Flush the partial batch before forwarding the completion.
                    let partial = std::mem::take(&mut *batch.lock().unwrap());
                    if !partial.is_empty() {
                        shared.update(partial);
                    }
                    shared.close(c);
                }
            }
        }
    });

    producer.retain(handler);
    producer.channel()
}

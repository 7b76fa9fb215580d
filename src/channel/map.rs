use std::sync::Arc;

use crate::channel::{Channel, ChannelEvent, Producer};
use crate::error::Error;
use crate::executor::Executor;
use crate::fallible::Fallible;

pub(super) fn map<U, S, V>(
    upstream: &Channel<U, S>,
    f: impl Fn(U) -> V + Send + Sync + 'static,
) -> Channel<V, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    let producer = Producer::new(upstream.shared.capacity);

    // Downstream is held weakly; the subscription chain stays alive only
    // through whoever still observes the downstream.
    let weak = Arc::downgrade(&producer.shared);
    let handler = upstream.on_event(&Executor::immediate(), move |event| {
        if let Some(shared) = weak.upgrade() {
            match event {
                ChannelEvent::Update(u) => {
                    shared.update(f(u));
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

pub(super) fn try_map<U, S, V>(
    upstream: &Channel<U, S>,
    f: impl Fn(U) -> Result<V, Error> + Send + Sync + 'static,
) -> Channel<V, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    let producer = Producer::new(upstream.shared.capacity);

    let weak = Arc::downgrade(&producer.shared);
    let handler = upstream.on_event(&Executor::immediate(), move |event| {
        if let Some(shared) = weak.upgrade() {
            match event {
                ChannelEvent::Update(u) => match f(u) {
                    Ok(v) => {
                        shared.update(v);
                    }
                    Err(e) => {
                        shared.close(Fallible::Failure(e));
                    }
                },
                ChannelEvent::Completion(c) => {
                    shared.close(c);
                }
            }
        }
    });

    producer.retain(handler);
    producer.channel()
}

pub(super) fn map_completion<U, S, S2>(
    upstream: &Channel<U, S>,
    f: impl Fn(Fallible<S>) -> Fallible<S2> + Send + Sync + 'static,
) -> Channel<U, S2>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
    S2: Clone + Send + 'static,
{
    let producer = Producer::new(upstream.shared.capacity);

    let weak = Arc::downgrade(&producer.shared);
    let handler = upstream.on_event(&Executor::immediate(), move |event| {
        if let Some(shared) = weak.upgrade() {
            match event {
                ChannelEvent::Update(u) => {
                    shared.update(u);
                }
                ChannelEvent::Completion(c) => {
                    shared.close(f(c));
                }
            }
        }
    });

    producer.retain(handler);
    producer.channel()
}

pub(super) fn recover<U, S>(
    upstream: &Channel<U, S>,
    f: impl Fn(Error) -> S + Send + Sync + 'static,
) -> Channel<U, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    map_completion(upstream, move |completion| completion.recover(|e| f(e)))
}

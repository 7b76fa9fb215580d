//! Streams of updates terminated by a single completion.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::cancel::{AsCancellable, Cancellable};
use crate::context::{contextual, Context};
use crate::error::Error;
use crate::executor::Executor;
use crate::fallible::Fallible;
use crate::handler::{Handler, HandlerInner};
use crate::release::ReleasePool;
use crate::sync::HeadCell;

mod buffered;
mod debounce;
mod delay;
mod distinct;
mod enumerate;
mod map;
mod pairs;

/// A single event observed by a channel subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent<U, S> {
    /// A non-terminal value.
    Update(U),
    /// The terminal value; nothing follows it.
    Completion(Fallible<S>),
}

enum ChanState<U, S> {
    Open {
        subscribers: Vec<Weak<HandlerInner<ChannelEvent<U, S>>>>,
        replay: VecDeque<U>,
    },
    Closed {
        completion: Fallible<S>,
        replay: VecDeque<U>,
    },
}

/// State shared between a [`Producer`] and its [`Channel`]s.
pub(crate) struct ChanShared<U, S> {
    state: HeadCell<ChanState<U, S>>,
    pub(crate) pool: ReleasePool,
    /// Ring capacity for replaying updates to late subscribers.
    pub(crate) capacity: usize,
}

impl<U, S> ChanShared<U, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    fn new(capacity: usize) -> Arc<ChanShared<U, S>> {
        Arc::new(ChanShared {
            state: HeadCell::new(ChanState::Open {
                subscribers: Vec::new(),
                replay: VecDeque::with_capacity(capacity),
            }),
            pool: ReleasePool::new(),
            capacity,
        })
    }

    /// Registers a handler, seeding its mailbox with the replay buffer (and
    /// the completion, if already closed).
    ///
    /// Seeding and list insertion happen in one critical section: an update
    /// that ran earlier is in the replay snapshot, an update that runs later
    /// sees the handler in the list. Each update lands exactly once, in order.
    pub(crate) fn subscribe(
        this: &Arc<ChanShared<U, S>>,
        executor: &Executor,
        callback: impl Fn(ChannelEvent<U, S>) + Send + Sync + 'static,
    ) -> Handler<ChannelEvent<U, S>> {
        let handler = HandlerInner::new(executor.clone(), callback);

        this.state.update(|state| match state {
            ChanState::Open {
                subscribers,
                replay,
            } => {
                for u in replay.iter() {
                    handler.enqueue(ChannelEvent::Update(u.clone()));
                }
                subscribers.retain(|w| w.strong_count() > 0);
                subscribers.push(Arc::downgrade(&handler));
            }
            ChanState::Closed { completion, replay } => {
                for u in replay.iter() {
                    handler.enqueue(ChannelEvent::Update(u.clone()));
                }
                handler.enqueue(ChannelEvent::Completion(completion.clone()));
            }
        });

        handler.flush();
        Handler {
            inner: handler,
            source: this.clone(),
        }
    }

    /// Dispatches an update to every live subscriber. Returns `false` once
    /// closed.
    pub(crate) fn update(&self, update: U) -> bool {
        let targets = self.state.update(|state| match state {
            ChanState::Open {
                subscribers,
                replay,
            } => {
                if self.capacity > 0 {
                    if replay.len() == self.capacity {
                        replay.pop_front();
                    }
                    replay.push_back(update.clone());
                }

                subscribers.retain(|w| w.strong_count() > 0);
                let mut targets = Vec::with_capacity(subscribers.len());
                for weak in subscribers.iter() {
                    if let Some(handler) = weak.upgrade() {
                        handler.enqueue(ChannelEvent::Update(update.clone()));
                        targets.push(handler);
                    }
                }
                Some(targets)
            }
            ChanState::Closed { .. } => None,
        });

        match targets {
            Some(targets) => {
                for handler in &targets {
                    handler.flush();
                }
                true
            }
            None => false,
        }
    }

    /// Transitions to `Closed`. At most one call returns `true`.
    pub(crate) fn close(&self, completion: Fallible<S>) -> bool {
        let targets = self.state.update(|state| match state {
            ChanState::Open {
                subscribers,
                replay,
            } => {
                let mut targets = Vec::with_capacity(subscribers.len());
                for weak in subscribers.iter() {
                    if let Some(handler) = weak.upgrade() {
                        handler.enqueue(ChannelEvent::Completion(completion.clone()));
                        targets.push(handler);
                    }
                }
                let replay = std::mem::take(replay);
                *state = ChanState::Closed {
                    completion: completion.clone(),
                    replay,
                };
                Some(targets)
            }
            ChanState::Closed { .. } => None,
        });

        match targets {
            Some(targets) => {
                log::trace!("channel closed ({} subscribers)", targets.len());
                for handler in &targets {
                    handler.flush();
                }
                self.pool.drain();
                true
            }
            None => false,
        }
    }

    pub(crate) fn completion(&self) -> Option<Fallible<S>> {
        self.state.update(|state| match state {
            ChanState::Closed { completion, .. } => Some(completion.clone()),
            ChanState::Open { .. } => None,
        })
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state
            .update(|state| matches!(state, ChanState::Closed { .. }))
    }
}

impl<U, S> Drop for ChanShared<U, S> {
    fn drop(&mut self) {
        self.pool.drain();
    }
}

impl<U, S> Cancellable for ChanShared<U, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    fn cancel(&self) {
        self.close(Fallible::Failure(Error::Cancelled));
    }
}

/// The write face of a [`Channel`].
///
/// A producer emits zero or more updates followed by exactly one completion.
/// The last `buffer_size` updates are replayed to late subscribers.
///
/// # Examples
///
/// ```
/// use relay::{ChannelEvent, Executor, Producer};
///
/// let producer = Producer::new(4);
/// producer.update(1);
/// producer.update(2);
/// producer.succeed("done");
///
/// let (tx, rx) = std::sync::mpsc::channel();
/// let _h = producer.channel().on_event(&Executor::immediate(), move |ev| {
///     tx.send(ev).unwrap();
/// });
///
/// assert_eq!(rx.recv().unwrap(), ChannelEvent::Update(1));
/// assert_eq!(rx.recv().unwrap(), ChannelEvent::Update(2));
/// ```
pub struct Producer<U, S> {
    pub(crate) shared: Arc<ChanShared<U, S>>,
}

impl<U, S> Producer<U, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    /// Creates an open producer replaying up to `buffer_size` updates to late
    /// subscribers. A zero `buffer_size` disables replay.
    pub fn new(buffer_size: usize) -> Producer<U, S> {
        Producer {
            shared: ChanShared::new(buffer_size),
        }
    }

    /// Returns the read face of this producer.
    pub fn channel(&self) -> Channel<U, S> {
        Channel {
            shared: self.shared.clone(),
        }
    }

    /// Emits an update to every subscriber, in production order.
    ///
    /// Returns `false` once the producer is closed.
    pub fn update(&self, update: U) -> bool {
        self.shared.update(update)
    }

    /// Closes the producer with a terminal value.
    ///
    /// Each subscriber observes the completion after every update that was
    /// dispatched to it. Returns `true` iff this call closed the producer.
    pub fn complete(&self, completion: Fallible<S>) -> bool {
        self.shared.close(completion)
    }

    /// Closes with a success.
    pub fn succeed(&self, value: S) -> bool {
        self.complete(Fallible::Success(value))
    }

    /// Closes with a failure.
    pub fn fail(&self, err: Error) -> bool {
        self.complete(Fallible::Failure(err))
    }

    /// Closes with [`Error::Cancelled`].
    pub fn cancel(&self) -> bool {
        self.fail(Error::Cancelled)
    }

    /// Returns `true` once the producer is closed.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Keeps `obj` alive until the producer closes.
    pub fn retain(&self, obj: impl std::any::Any + Send) {
        self.shared.pool.insert(obj);
    }
}

impl<U, S> Clone for Producer<U, S> {
    fn clone(&self) -> Producer<U, S> {
        Producer {
            shared: self.shared.clone(),
        }
    }
}

impl<U, S> AsCancellable for Producer<U, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    fn as_cancellable(&self) -> Weak<dyn Cancellable> {
        let weak: Weak<ChanShared<U, S>> = Arc::downgrade(&self.shared);
        weak
    }
}

impl<U, S> fmt::Debug for Producer<U, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("Producer { .. }")
    }
}

/// The read face of a stream of updates ending in a completion.
///
/// Subscribers see a suffix of the update history (bounded by the producer's
/// replay buffer) followed by the completion. Per subscriber, events arrive
/// in production order; across subscribers there is no ordering guarantee.
pub struct Channel<U, S> {
    pub(crate) shared: Arc<ChanShared<U, S>>,
}

impl<U, S> Channel<U, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    /// Registers `callback` for every event, replaying buffered updates
    /// first.
    ///
    /// The returned [`Handler`] owns the subscription; dropping it
    /// unsubscribes.
    pub fn on_event(
        &self,
        executor: &Executor,
        callback: impl Fn(ChannelEvent<U, S>) + Send + Sync + 'static,
    ) -> Handler<ChannelEvent<U, S>> {
        ChanShared::subscribe(&self.shared, executor, callback)
    }

    /// Like [`on_event`](Channel::on_event), but only for updates.
    pub fn on_update(
        &self,
        executor: &Executor,
        callback: impl Fn(U) + Send + Sync + 'static,
    ) -> Handler<ChannelEvent<U, S>> {
        self.on_event(executor, move |event| {
            if let ChannelEvent::Update(u) = event {
                callback(u);
            }
        })
    }

    /// Like [`on_event`](Channel::on_event), but only for the completion.
    pub fn on_completion(
        &self,
        executor: &Executor,
        callback: impl Fn(Fallible<S>) + Send + Sync + 'static,
    ) -> Handler<ChannelEvent<U, S>> {
        self.on_event(executor, move |event| {
            if let ChannelEvent::Completion(c) = event {
                callback(c);
            }
        })
    }

    /// Contextual subscription: `callback` runs on the context's executor and
    /// is severed silently if `ctx` is dropped first.
    pub fn on_event_with<C: Context>(
        &self,
        ctx: &Arc<C>,
        callback: impl Fn(&C, ChannelEvent<U, S>) + Send + Sync + 'static,
    ) -> Handler<ChannelEvent<U, S>> {
        let executor = ctx.executor();
        let (callback, slot) = contextual(ctx, callback);
        let handler = self.on_event(&executor, callback);
        let _ = slot.set(Arc::downgrade(&handler.inner));
        handler
    }

    /// Returns the terminal value, if the channel has closed.
    pub fn completion(&self) -> Option<Fallible<S>> {
        self.shared.completion()
    }

    /// Transforms every update; the completion passes through unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use relay::{Executor, Producer};
    ///
    /// let producer = Producer::<i32, ()>::new(0);
    /// let doubled = producer.channel().map(|n| n * 2);
    ///
    /// let (tx, rx) = std::sync::mpsc::channel();
    /// let _h = doubled.on_update(&Executor::immediate(), move |n| tx.send(n).unwrap());
    ///
    /// producer.update(21);
    /// assert_eq!(rx.recv().unwrap(), 42);
    /// ```
    pub fn map<V: Clone + Send + 'static>(
        &self,
        f: impl Fn(U) -> V + Send + Sync + 'static,
    ) -> Channel<V, S> {
        map::map(self, f)
    }

    /// Transforms every update with a fallible function.
    ///
    /// An `Err` closes the downstream with that failure; later upstream
    /// updates are dropped.
    pub fn try_map<V: Clone + Send + 'static>(
        &self,
        f: impl Fn(U) -> Result<V, Error> + Send + Sync + 'static,
    ) -> Channel<V, S> {
        map::try_map(self, f)
    }

    /// Transforms the completion; updates pass through unchanged.
    pub fn map_completion<S2: Clone + Send + 'static>(
        &self,
        f: impl Fn(Fallible<S>) -> Fallible<S2> + Send + Sync + 'static,
    ) -> Channel<U, S2> {
        map::map_completion(self, f)
    }

    /// Converts a failed completion into a success; updates and successful
    /// completions pass through.
    pub fn recover(&self, f: impl Fn(Error) -> S + Send + Sync + 'static) -> Channel<U, S> {
        map::recover(self, f)
    }

    /// Attaches a 0-based index to every update.
    pub fn enumerate(&self) -> Channel<(usize, U), S> {
        enumerate::enumerate(self)
    }

    /// Emits `(previous, current)` for consecutive updates.
    ///
    /// The first upstream update emits nothing.
    pub fn pairs(&self) -> Channel<(U, U), S> {
        pairs::pairs(self)
    }

    /// Collects updates into batches of `capacity`.
    ///
    /// A non-empty partial batch is flushed before the completion.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn buffered(&self, capacity: usize) -> Channel<Vec<U>, S> {
        buffered::buffered(self, capacity)
    }

    /// Re-dispatches every event after `dur`, preserving order.
    pub fn delay(&self, dur: Duration) -> Channel<U, S> {
        delay::delay(self, dur)
    }

    /// Coalesces bursts of updates.
    ///
    /// The first update passes through immediately. Afterwards a tick every
    /// `interval` emits the most recent pending update, if any. Completion
    /// flushes a pending update before it is forwarded.
    pub fn debounce(&self, interval: Duration) -> Channel<U, S> {
        debounce::debounce(self, interval, Duration::ZERO, interval)
    }

    /// [`debounce`](Channel::debounce) with the full timer configuration: the
    /// first tick fires after `first_after`, and ticks that find nothing
    /// pending re-arm with `leeway` added, saving wakeups while the upstream
    /// is quiet.
    pub fn debounce_with(
        &self,
        interval: Duration,
        leeway: Duration,
        first_after: Duration,
    ) -> Channel<U, S> {
        debounce::debounce(self, interval, leeway, first_after)
    }

    /// Drops updates equal to their predecessor.
    ///
    /// The first update is always emitted. `Option<U>` and collections of
    /// comparable items work through their own `PartialEq`.
    pub fn distinct(&self) -> Channel<U, S>
    where
        U: PartialEq,
    {
        distinct::distinct_by(self, |prev, next| prev == next)
    }

    /// Like [`distinct`](Channel::distinct) with a caller-supplied equality.
    pub fn distinct_by(
        &self,
        eq: impl Fn(&U, &U) -> bool + Send + Sync + 'static,
    ) -> Channel<U, S> {
        distinct::distinct_by(self, eq)
    }
}

impl<U, S> Clone for Channel<U, S> {
    fn clone(&self) -> Channel<U, S> {
        Channel {
            shared: self.shared.clone(),
        }
    }
}

impl<U, S> AsCancellable for Channel<U, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    fn as_cancellable(&self) -> Weak<dyn Cancellable> {
        let weak: Weak<ChanShared<U, S>> = Arc::downgrade(&self.shared);
        weak
    }
}

impl<U, S> fmt::Debug for Channel<U, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("Channel { .. }")
    }
}

/// Runs `f` with a fresh producer on `executor` and returns the channel.
pub fn spawn<U, S>(
    executor: &Executor,
    buffer_size: usize,
    f: impl FnOnce(&Producer<U, S>) + Send + 'static,
) -> Channel<U, S>
where
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    let producer = Producer::new(buffer_size);
    let inner = producer.clone();

    executor.execute(move || f(&inner));

    producer.channel()
}

/// Runs `f` with a fresh producer against a weakly-held context.
///
/// If `ctx` is dropped before `f` runs, the channel closes with
/// [`Error::ContextDropped`].
pub fn with_context<C, U, S>(
    ctx: &Arc<C>,
    buffer_size: usize,
    f: impl FnOnce(&C, &Producer<U, S>) + Send + 'static,
) -> Channel<U, S>
where
    C: Context,
    U: Clone + Send + 'static,
    S: Clone + Send + 'static,
{
    let producer = Producer::new(buffer_size);
    let inner = producer.clone();
    let weak = Arc::downgrade(ctx);

    ctx.executor().execute(move || match weak.upgrade() {
        Some(ctx) => f(&ctx, &inner),
        None => {
            inner.fail(Error::ContextDropped);
        }
    });

    producer.channel()
}

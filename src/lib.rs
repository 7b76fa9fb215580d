//! Callback-driven futures and channels.
//!
//! This crate provides two reactive primitives and the machinery around
//! them:
//!
//! * [`Future`]/[`Promise`] — a value that becomes available exactly once.
//! * [`Channel`]/[`Producer`] — a stream of updates ending in a completion,
//!   with a bounded replay buffer for late subscribers.
//!
//! Callbacks are dispatched onto [`Executor`]s: the shared background pool,
//! serial queues, the caller's own thread, or anything implementing
//! [`Schedule`]. Combinators ([`map`](Channel::map),
//! [`debounce`](Channel::debounce), [`zip`](Future::zip), …) stack new
//! primitives on top of existing ones while preserving per-subscriber
//! ordering and cancellation.
//!
//! # Examples
//!
//! ```
//! use relay::{Executor, Producer};
//!
//! let producer = Producer::<i32, ()>::new(8);
//! let evens = producer.channel().map(|n| n * 2).enumerate();
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! let _h = evens.on_update(&Executor::immediate(), move |pair| {
//!     tx.send(pair).unwrap();
//! });
//!
//! producer.update(10);
//! producer.update(20);
//! assert_eq!(rx.recv().unwrap(), (0, 20));
//! assert_eq!(rx.recv().unwrap(), (1, 40));
//! ```

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod channel;
pub mod future;
pub mod promise;

mod cancel;
mod context;
mod error;
mod executor;
mod fallible;
mod handler;
mod release;

pub mod prelude;

pub(crate) mod sync;
pub(crate) mod utils;

pub use cancel::{AsCancellable, CancelHook, Cancellable, CancellationToken};
pub use channel::{Channel, ChannelEvent, Producer};
pub use context::Context;
pub use error::Error;
pub use executor::{Executor, Schedule, Task};
pub use fallible::Fallible;
pub use future::Future;
pub use handler::Handler;
pub use promise::Promise;
pub use release::ReleasePool;

//! The prelude.
//!
//! ```
//! use relay::prelude::*;
//! ```

pub use crate::cancel::{AsCancellable, Cancellable, CancellationToken};
pub use crate::channel::{Channel, ChannelEvent, Producer};
pub use crate::context::Context;
pub use crate::error::Error;
pub use crate::executor::Executor;
pub use crate::fallible::Fallible;
pub use crate::future::Future;
pub use crate::handler::Handler;
pub use crate::promise::Promise;

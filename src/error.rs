//! Errors produced by the library itself.

use std::fmt;
use std::sync::Arc;

/// An error carried by a failed completion.
///
/// The three unit variants are produced by the library; [`Error::User`] wraps
/// anything a user transform returned. The whole type is cheap to clone so a
/// single failure can fan out to every subscriber.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A cancellation token fired, or `cancel` was called directly.
    #[error("operation cancelled")]
    Cancelled,

    /// The weakly-held context of a contextual operation was dropped before
    /// the callback ran.
    #[error("context dropped before the callback ran")]
    ContextDropped,

    /// A deadline elapsed with no completion.
    #[error("operation timed out")]
    Timeout,

    /// An error raised by user code, propagated unchanged.
    #[error("{0}")]
    User(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wraps an arbitrary error raised by user code.
    pub fn user(err: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::User(Arc::new(err))
    }

    /// Wraps a plain message as a user error.
    pub fn message(msg: impl Into<String>) -> Error {
        Error::User(Arc::new(Message(msg.into())))
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::Cancelled, Error::Cancelled) => true,
            (Error::ContextDropped, Error::ContextDropped) => true,
            (Error::Timeout, Error::Timeout) => true,
            (Error::User(a), Error::User(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for Message {}

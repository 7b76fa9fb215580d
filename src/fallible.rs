//! The success-or-failure value delivered by completions.

use crate::error::Error;

/// The result of an operation that can fail.
///
/// Every terminal value in this crate is a `Fallible`: a [`Future`] completes
/// with one, and a [`Channel`] ends its stream of updates with one. It is a
/// plain value with no identity; clone it freely.
///
/// [`Future`]: crate::future::Future
/// [`Channel`]: crate::channel::Channel
///
/// # Examples
///
/// ```
/// use relay::Fallible;
///
/// let doubled = Fallible::success(21).map(|n| n * 2);
/// assert_eq!(doubled.unwrap(), 42);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Fallible<T> {
    /// The operation produced a value.
    Success(T),
    /// The operation failed.
    Failure(Error),
}

impl<T> Fallible<T> {
    /// Wraps a value in `Success`.
    pub fn success(value: T) -> Fallible<T> {
        Fallible::Success(value)
    }

    /// Wraps an error in `Failure`.
    pub fn failure(err: Error) -> Fallible<T> {
        Fallible::Failure(err)
    }

    /// Returns `true` if this is a `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Fallible::Success(_))
    }

    /// Applies `f` to a success value, passing failures through unchanged.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fallible<U> {
        match self {
            Fallible::Success(v) => Fallible::Success(f(v)),
            Fallible::Failure(e) => Fallible::Failure(e),
        }
    }

    /// Applies a fallible `f` to a success value.
    ///
    /// An `Err` returned by `f` becomes a `Failure`. This is how combinators
    /// turn errors raised inside user transforms into failed completions.
    pub fn try_map<U>(self, f: impl FnOnce(T) -> Result<U, Error>) -> Fallible<U> {
        match self {
            Fallible::Success(v) => match f(v) {
                Ok(u) => Fallible::Success(u),
                Err(e) => Fallible::Failure(e),
            },
            Fallible::Failure(e) => Fallible::Failure(e),
        }
    }

    /// Applies `f` to a success value, flattening the nested `Fallible`.
    pub fn flat_map<U>(self, f: impl FnOnce(T) -> Fallible<U>) -> Fallible<U> {
        match self {
            Fallible::Success(v) => f(v),
            Fallible::Failure(e) => Fallible::Failure(e),
        }
    }

    /// Converts a failure back into a success, passing successes through.
    pub fn recover(self, f: impl FnOnce(Error) -> T) -> Fallible<T> {
        match self {
            Fallible::Success(v) => Fallible::Success(v),
            Fallible::Failure(e) => Fallible::Success(f(e)),
        }
    }

    /// Converts a failure back into a success, where recovery itself can fail.
    pub fn try_recover(self, f: impl FnOnce(Error) -> Result<T, Error>) -> Fallible<T> {
        match self {
            Fallible::Success(v) => Fallible::Success(v),
            Fallible::Failure(e) => match f(e) {
                Ok(v) => Fallible::Success(v),
                Err(e) => Fallible::Failure(e),
            },
        }
    }

    /// Returns the success value, if any.
    pub fn ok(self) -> Option<T> {
        match self {
            Fallible::Success(v) => Some(v),
            Fallible::Failure(_) => None,
        }
    }

    /// Returns the error, if any.
    pub fn err(self) -> Option<Error> {
        match self {
            Fallible::Success(_) => None,
            Fallible::Failure(e) => Some(e),
        }
    }

    /// Returns the success value.
    ///
    /// # Panics
    ///
    /// Panics if this is a `Failure`.
    pub fn unwrap(self) -> T {
        match self {
            Fallible::Success(v) => v,
            Fallible::Failure(e) => panic!("called `Fallible::unwrap()` on a failure: {}", e),
        }
    }
}

impl<T> From<Result<T, Error>> for Fallible<T> {
    fn from(res: Result<T, Error>) -> Fallible<T> {
        match res {
            Ok(v) => Fallible::Success(v),
            Err(e) => Fallible::Failure(e),
        }
    }
}

impl<T> From<Fallible<T>> for Result<T, Error> {
    fn from(f: Fallible<T>) -> Result<T, Error> {
        match f {
            Fallible::Success(v) => Ok(v),
            Fallible::Failure(e) => Err(e),
        }
    }
}

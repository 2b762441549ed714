// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache operations.

use std::fmt::{self, Debug, Display};
use std::sync::Arc;

type SharedCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// An error from a cache operation.
///
/// Errors are cheap to clone: a fetch failure is delivered to every caller attached to the
/// same in-flight operation, and a suspending cache hands the same failure out on every read
/// until the entry is cleared.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The producer behind a fetch failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchFailure),

    /// An invalidation pattern could not be compiled.
    #[error("invalid invalidation pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    /// Returns the producer's original error if it is of type `E`.
    ///
    /// # Examples
    ///
    /// ```
    /// use stashline::{Error, FetchFailure};
    ///
    /// let error = Error::from(FetchFailure::new(std::io::Error::other("offline")));
    ///
    /// let io = error.source_as::<std::io::Error>().expect("an io error");
    /// assert_eq!(io.to_string(), "offline");
    /// ```
    #[must_use]
    pub fn source_as<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Fetch(failure) => failure.cause.downcast_ref::<E>(),
            Self::Pattern(_) => None,
        }
    }

    /// Returns `true` if the error came from a producer.
    #[must_use]
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_))
    }
}

/// A producer failure shared by every caller that observed it.
#[derive(Clone)]
pub struct FetchFailure {
    cause: SharedCause,
}

impl FetchFailure {
    /// Wraps a producer error.
    pub fn new<E>(cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self { cause: Arc::new(cause) }
    }

    /// Creates a failure from a plain message.
    ///
    /// # Examples
    ///
    /// ```
    /// use stashline::FetchFailure;
    ///
    /// let failure = FetchFailure::from_message("upstream returned 503");
    /// assert_eq!(failure.to_string(), "upstream returned 503");
    /// ```
    pub fn from_message(message: impl Into<String>) -> Self {
        let cause: Box<dyn std::error::Error + Send + Sync> = message.into().into();
        Self { cause: Arc::from(cause) }
    }

    /// Returns the underlying producer error.
    #[must_use]
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.cause
    }
}

impl Debug for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&*self.cause, f)
    }
}

impl Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&*self.cause, f)
    }
}

impl std::error::Error for FetchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.source()
    }
}

/// A specialized [`Result`] type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

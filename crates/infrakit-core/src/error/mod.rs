//! Error types shared by every infrakit module.
//!
//! - [`Error`] is the crate-wide error enum and the library's generic
//!   retryable failure kind.
//! - [`Failure`] is a plain operational failure that remembers what caused it
//!   and what was being handled when it was raised.
//! - [`failure_chain`] renders a failure together with everything behind it.

mod chain;

pub use chain::{Failure, Link, failure_chain};

use std::io;
use std::path::PathBuf;

/// Result type for infrakit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by infrakit.
///
/// `InvalidPolicy` and `UnknownBackoffMode` are programming errors and are
/// never retried. Everything else describes an operational failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Generic operational failure
    #[error(transparent)]
    Failure(#[from] Failure),

    /// A retry policy failed validation
    #[error("Invalid retry policy: {0}")]
    InvalidPolicy(String),

    /// The standalone backoff computation was given an unknown mode
    #[error("Invalid backoff_mode: {0}")]
    UnknownBackoffMode(String),

    /// An exclusive lock could not be acquired within the timeout
    #[error("Unable to acquire exclusive lock on {}", path.display())]
    Lock {
        /// File that could not be locked
        path: PathBuf,
        /// Last error returned by the lock attempt
        #[source]
        source: io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Retry configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Create a generic operational failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(Failure::new(message))
    }

    /// Whether this error is a configuration mistake rather than an
    /// operational failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidPolicy(_) | Self::UnknownBackoffMode(_) | Self::Config(_)
        )
    }
}

// Lets operations whose natural error is io::Error be wrapped directly.
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            other => io::Error::other(other),
        }
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        match err {
            Error::Failure(failure) => failure,
            other => Failure::new(other.to_string()),
        }
    }
}

//! Retry policies and failure classification.

use std::any::type_name;
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::backoff::BackoffMode;
use crate::error::{Error, Failure, Result};

/// A named class of failures that should trigger another attempt.
///
/// # Examples
///
/// ```
/// use infrakit_core::retry::FailureKind;
/// use std::io;
///
/// let busy = FailureKind::new("resource unavailable", |err: &io::Error| {
///     err.kind() == io::ErrorKind::WouldBlock
/// });
///
/// assert!(busy.matches(&io::Error::from(io::ErrorKind::WouldBlock)));
/// assert!(!busy.matches(&io::Error::from(io::ErrorKind::NotFound)));
/// ```
pub struct FailureKind<E> {
    name: Cow<'static, str>,
    predicate: Arc<dyn Fn(&E) -> bool + Send + Sync>,
}

impl<E: 'static> FailureKind<E> {
    /// Classify failures with an arbitrary predicate.
    pub fn new<P>(name: impl Into<Cow<'static, str>>, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Every failure.
    pub fn any() -> Self {
        Self::new("any", |_: &E| true)
    }
}

impl<E> FailureKind<E> {
    /// Name used in logs and debug output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `err` belongs to this kind.
    pub fn matches(&self, err: &E) -> bool {
        (self.predicate)(err)
    }
}

impl<E: StdError + 'static> FailureKind<E> {
    /// Failures whose concrete type is `K`.
    pub fn of<K: StdError + 'static>() -> Self {
        Self::new(type_name::<K>(), |err: &E| {
            let err: &(dyn StdError + 'static) = err;
            err.is::<K>()
        })
    }

    /// The library's generic failure kind: a bare [`Failure`] or any
    /// [`Error`] that is not a configuration mistake.
    pub fn library() -> Self {
        Self::new("infrakit", |err: &E| {
            let err: &(dyn StdError + 'static) = err;
            err.is::<Failure>()
                || err
                    .downcast_ref::<Error>()
                    .is_some_and(|err| !err.is_configuration())
        })
    }
}

impl<E> Clone for FailureKind<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<E> fmt::Debug for FailureKind<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FailureKind").field(&self.name).finish()
    }
}

/// Describes the operation being retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    name: Cow<'static, str>,
}

impl Operation {
    /// An operation with an explicit qualified name.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    /// An operation named after the type of the callable `F`.
    ///
    /// For functions this is the path of the function, e.g.
    /// `my_crate::checks::poll_file`.
    pub fn of<F>() -> Self {
        Self::named(type_name::<F>())
    }

    /// Fully qualified name of the operation.
    pub fn qualified_name(&self) -> &str {
        &self.name
    }

    /// The failure message used when none is configured.
    pub fn default_failure_message(&self) -> String {
        format!("Attempt to run '{}' raised", self.name)
    }
}

/// The resolved retry parameters for one call.
///
/// A fresh policy is built for every call of a wrapped operation. Adjusters
/// registered with [`RetryBuilder::adjust_with`](super::RetryBuilder::adjust_with)
/// receive it by value and return the policy to use.
pub struct RetryPolicy<E> {
    /// Total number of attempts, first try included
    pub tries: u32,
    /// Base delay fed to the backoff curve
    pub delay: Duration,
    /// Backoff curve
    pub backoff_mode: BackoffMode,
    /// Failures that trigger another attempt
    pub retry_on: Vec<FailureKind<E>>,
    /// Label logged with each retryable failure
    pub failure_message: String,
}

impl<E> RetryPolicy<E> {
    /// Check the consistency of the current values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPolicy`] if any field has an invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.backoff_mode == BackoffMode::Exponential && self.delay < Duration::from_secs(1) {
            return Err(Error::InvalidPolicy(format!(
                "Delay must be greater than 1 if backoff_mode is exponential, got {:?}",
                self.delay
            )));
        }

        if self.tries < 1 {
            return Err(Error::InvalidPolicy(format!(
                "Tries must be a positive integer, got {}",
                self.tries
            )));
        }

        if self.failure_message.is_empty() {
            return Err(Error::InvalidPolicy("A failure_message must be set.".to_string()));
        }

        Ok(())
    }

    /// Whether `err` should trigger another attempt.
    pub fn is_retryable(&self, err: &E) -> bool {
        self.retry_on.iter().any(|kind| kind.matches(err))
    }

    /// Sleep after the `attempt`-th (1-based) failure.
    pub fn sleep_for(&self, attempt: u32) -> Duration {
        self.backoff_mode.sleep(self.delay, attempt)
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            tries: self.tries,
            delay: self.delay,
            backoff_mode: self.backoff_mode,
            retry_on: self.retry_on.clone(),
            failure_message: self.failure_message.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("tries", &self.tries)
            .field("delay", &self.delay)
            .field("backoff_mode", &self.backoff_mode)
            .field("retry_on", &self.retry_on)
            .field("failure_message", &self.failure_message)
            .finish()
    }
}

//! The retry controller.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::backoff::BackoffMode;
use super::policy::{FailureKind, Operation, RetryPolicy};
use super::sleep::{Sleeper, ThreadSleeper};
use crate::error::{Error, Result, failure_chain};

/// Default number of attempts.
pub const DEFAULT_TRIES: u32 = 3;

/// Default base delay.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

type Adjuster<A, E> =
    Arc<dyn Fn(RetryPolicy<E>, &Operation, &A) -> RetryPolicy<E> + Send + Sync>;

/// Wrap `operation` with the default retry settings.
///
/// This is the bare form of the controller: 3 tries, 3 seconds of base delay,
/// exponential backoff, retrying only on the library's own operational
/// [`Error`]s (or a bare [`Failure`](crate::error::Failure)). Use
/// [`Retry::builder`] for anything else.
///
/// The operation receives a shared reference to the call arguments and must
/// be idempotent, as it may run several times for a single call.
///
/// # Examples
///
/// ```
/// use infrakit_core::error::Error;
/// use infrakit_core::retry::retry;
///
/// let poll = retry(|path: &String| {
///     if path.is_empty() {
///         Err(Error::failure("no path given"))
///     } else {
///         Ok(path.len())
///     }
/// });
///
/// assert_eq!(poll.call("/tmp".to_string()).unwrap(), 4);
/// ```
pub fn retry<F, A, T, E>(operation: F) -> Retrying<F, A, E>
where
    F: Fn(&A) -> std::result::Result<T, E>,
    E: StdError + 'static,
{
    Retry::default().wrap(operation)
}

/// A configured retry controller that can wrap any number of operations.
///
/// Built with [`Retry::builder`]. Each [`Retrying::call`] builds its own
/// [`RetryPolicy`] from these settings, so one `Retry` can be shared freely.
pub struct Retry<A, E> {
    tries: u32,
    delay: Duration,
    backoff_mode: std::result::Result<BackoffMode, String>,
    retry_on: Vec<FailureKind<E>>,
    failure_message: Option<String>,
    adjusters: Vec<Adjuster<A, E>>,
    sleeper: Arc<dyn Sleeper>,
}

impl<A, E> Retry<A, E> {
    /// Create a new builder for configuring a retry controller.
    pub fn builder() -> RetryBuilder<A, E> {
        RetryBuilder::default()
    }

    /// Wrap `operation`, naming it after its type.
    pub fn wrap<F>(self, operation: F) -> Retrying<F, A, E> {
        Retrying {
            operation: Operation::of::<F>(),
            retry: self,
            func: operation,
        }
    }

    /// Wrap `operation` under an explicit qualified name.
    pub fn wrap_named<F>(
        self,
        name: impl Into<Cow<'static, str>>,
        operation: F,
    ) -> Retrying<F, A, E> {
        Retrying {
            operation: Operation::named(name),
            retry: self,
            func: operation,
        }
    }

    /// Resolve the policy for one call: static settings, then adjusters, then
    /// validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPolicy`] if the backoff mode name is unknown or
    /// the adjusted policy fails [`RetryPolicy::validate`].
    pub fn policy_for(&self, operation: &Operation, args: &A) -> Result<RetryPolicy<E>> {
        let backoff_mode = self
            .backoff_mode
            .clone()
            .map_err(|name| Error::InvalidPolicy(format!("Invalid backoff_mode: {name}")))?;

        let mut policy = RetryPolicy {
            tries: self.tries,
            delay: self.delay,
            backoff_mode,
            retry_on: self.retry_on.clone(),
            failure_message: self
                .failure_message
                .clone()
                .unwrap_or_else(|| operation.default_failure_message()),
        };
        for adjust in &self.adjusters {
            policy = adjust(policy, operation, args);
        }

        policy.validate()?;
        Ok(policy)
    }

    /// Run `func` with `args` under this controller's settings.
    ///
    /// Configuration errors are converted into `E` and returned before the
    /// first attempt. Retryable failures are logged and followed by a sleep
    /// until the last attempt, whose outcome is returned as is. Any other
    /// failure is returned immediately.
    pub fn run<F, T>(&self, operation: &Operation, args: &A, func: F) -> std::result::Result<T, E>
    where
        F: Fn(&A) -> std::result::Result<T, E>,
        E: StdError + From<Error> + 'static,
    {
        let policy = self.policy_for(operation, args)?;

        let mut attempt = 0;
        while attempt < policy.tries - 1 {
            attempt += 1;
            match func(args) {
                Ok(value) => return Ok(value),
                Err(err) if policy.is_retryable(&err) => {
                    let sleep = policy.sleep_for(attempt);
                    warn!(
                        operation = operation.qualified_name(),
                        attempt,
                        tries = policy.tries,
                        sleep_secs = sleep.as_secs_f64(),
                        "[{}/{}, retrying in {:.2}s] {}: {}",
                        attempt,
                        policy.tries,
                        sleep.as_secs_f64(),
                        policy.failure_message,
                        failure_chain(&err)
                    );
                    self.sleeper.sleep(sleep);
                }
                Err(err) => return Err(err),
            }
        }

        func(args)
    }
}

impl<A, E: StdError + 'static> Default for Retry<A, E> {
    fn default() -> Self {
        RetryBuilder::default().build()
    }
}

impl<A, E> fmt::Debug for Retry<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("tries", &self.tries)
            .field("delay", &self.delay)
            .field("backoff_mode", &self.backoff_mode)
            .field("retry_on", &self.retry_on)
            .field("failure_message", &self.failure_message)
            .field("adjusters", &self.adjusters.len())
            .finish_non_exhaustive()
    }
}

/// An operation wrapped by a [`Retry`] controller.
pub struct Retrying<F, A, E> {
    operation: Operation,
    retry: Retry<A, E>,
    func: F,
}

impl<F, A, E> Retrying<F, A, E> {
    /// Descriptor of the wrapped operation.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Call the wrapped operation with `args`, retrying as configured.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error when it is not retryable or when the
    /// last attempt fails, and [`Error::InvalidPolicy`] (converted into `E`)
    /// when the resolved policy is invalid.
    pub fn call<T>(&self, args: A) -> std::result::Result<T, E>
    where
        F: Fn(&A) -> std::result::Result<T, E>,
        E: StdError + From<Error> + 'static,
    {
        self.retry.run(&self.operation, &args, &self.func)
    }
}

impl<F, A, E> fmt::Debug for Retrying<F, A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrying")
            .field("operation", &self.operation)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Retry`].
///
/// Unset options fall back to the defaults of [`retry`].
///
/// # Examples
///
/// ```
/// use infrakit_core::retry::{BackoffMode, FailureKind, RecordingSleeper, Retry};
/// use std::io;
/// use std::time::Duration;
///
/// let sleeper = RecordingSleeper::new();
/// let fetch = Retry::builder()
///     .tries(5)
///     .delay(Duration::from_secs(30))
///     .backoff_mode(BackoffMode::Constant)
///     .retry_on(FailureKind::of::<io::Error>())
///     .failure_message("File not found")
///     .sleeper(sleeper.clone())
///     .build()
///     .wrap(|path: &&str| std::fs::read_to_string(path));
///
/// assert!(fetch.call("/nonexistent/file").is_err());
/// assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(30); 4]);
/// ```
pub struct RetryBuilder<A, E> {
    tries: Option<u32>,
    delay: Option<Duration>,
    backoff_mode: Option<std::result::Result<BackoffMode, String>>,
    retry_on: Vec<FailureKind<E>>,
    failure_message: Option<String>,
    adjusters: Vec<Adjuster<A, E>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl<A, E> Default for RetryBuilder<A, E> {
    fn default() -> Self {
        Self {
            tries: None,
            delay: None,
            backoff_mode: None,
            retry_on: Vec::new(),
            failure_message: None,
            adjusters: Vec::new(),
            sleeper: None,
        }
    }
}

impl<A, E> fmt::Debug for RetryBuilder<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryBuilder")
            .field("tries", &self.tries)
            .field("delay", &self.delay)
            .field("backoff_mode", &self.backoff_mode)
            .field("retry_on", &self.retry_on)
            .field("failure_message", &self.failure_message)
            .field("adjusters", &self.adjusters.len())
            .finish_non_exhaustive()
    }
}

impl<A, E> RetryBuilder<A, E> {
    /// Set the total number of attempts, first try included.
    ///
    /// Default: 3
    pub fn tries(mut self, tries: u32) -> Self {
        self.tries = Some(tries);
        self
    }

    /// Set the base delay of the backoff curve.
    ///
    /// Default: 3s
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Set the backoff curve.
    ///
    /// Default: [`BackoffMode::Exponential`]
    pub fn backoff_mode(mut self, mode: BackoffMode) -> Self {
        self.backoff_mode = Some(Ok(mode));
        self
    }

    /// Set the backoff curve from its textual name.
    ///
    /// An unknown name is reported as [`Error::InvalidPolicy`] when the
    /// wrapped operation is called, before any attempt is made. The check
    /// happens before the adjusters run, since [`RetryPolicy::backoff_mode`]
    /// only holds known modes: an adjuster cannot replace an unknown name.
    pub fn backoff_mode_name(mut self, name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        self.backoff_mode = Some(name.parse().map_err(|_| name.to_string()));
        self
    }

    /// Add a retryable failure kind.
    ///
    /// The first call replaces the default ([`FailureKind::library`]).
    pub fn retry_on(mut self, kind: FailureKind<E>) -> Self {
        self.retry_on.push(kind);
        self
    }

    /// Set the message logged with every retryable failure.
    ///
    /// Default: `Attempt to run '<qualified name>' raised`. An empty message
    /// counts as unset.
    pub fn failure_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.failure_message = (!message.is_empty()).then_some(message);
        self
    }

    /// Add a policy adjuster, run on every call before validation.
    ///
    /// Adjusters run in registration order. Each receives the policy built so
    /// far, the operation descriptor and the call arguments, and returns the
    /// policy to use.
    ///
    /// ```
    /// use infrakit_core::error::Error;
    /// use infrakit_core::retry::{RecordingSleeper, Retry};
    /// use std::time::Duration;
    ///
    /// struct Job {
    ///     slow: bool,
    /// }
    ///
    /// let sleeper = RecordingSleeper::new();
    /// let run = Retry::builder()
    ///     .tries(2)
    ///     .delay(Duration::from_secs(10))
    ///     .adjust_with(|mut policy, _op, job: &Job| {
    ///         if job.slow {
    ///             policy.delay *= 2;
    ///         }
    ///         policy
    ///     })
    ///     .sleeper(sleeper.clone())
    ///     .build()
    ///     .wrap(|_: &Job| Err::<(), _>(Error::failure("not yet")));
    ///
    /// assert!(run.call(Job { slow: true }).is_err());
    /// assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(20)]);
    /// ```
    pub fn adjust_with<P>(mut self, adjuster: P) -> Self
    where
        P: Fn(RetryPolicy<E>, &Operation, &A) -> RetryPolicy<E> + Send + Sync + 'static,
    {
        self.adjusters.push(Arc::new(adjuster));
        self
    }

    /// Set how the controller waits between attempts.
    ///
    /// Default: [`ThreadSleeper`]
    pub fn sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Some(Arc::new(sleeper));
        self
    }
}

impl<A, E: StdError + 'static> RetryBuilder<A, E> {
    /// Build the [`Retry`] controller, using defaults for unset options.
    pub fn build(self) -> Retry<A, E> {
        let retry_on = if self.retry_on.is_empty() {
            vec![FailureKind::library()]
        } else {
            self.retry_on
        };

        Retry {
            tries: self.tries.unwrap_or(DEFAULT_TRIES),
            delay: self.delay.unwrap_or(DEFAULT_DELAY),
            backoff_mode: self.backoff_mode.unwrap_or(Ok(BackoffMode::default())),
            retry_on,
            failure_message: self.failure_message,
            adjusters: self.adjusters,
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(ThreadSleeper)),
        }
    }
}

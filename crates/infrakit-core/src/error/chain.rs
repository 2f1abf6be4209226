//! Chained operational failures.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use super::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A generic operational failure with optional links to earlier failures.
///
/// Two kinds of link are tracked separately:
///
/// - an explicit **cause**: the failure this one was raised *because of*;
/// - an incidental **context**: a failure that was being handled when this one
///   happened, without being its cause.
///
/// When both are set the cause wins, see [`Failure::link`].
///
/// # Examples
///
/// ```
/// use infrakit_core::error::{Failure, failure_chain};
///
/// let failure = Failure::new("error1")
///     .while_handling(Failure::new("error2").caused_by(Failure::new("error3")));
///
/// assert_eq!(
///     failure_chain(&failure),
///     "error1\nRaised while handling: error2\nCaused by: error3"
/// );
/// ```
#[derive(Debug)]
pub struct Failure {
    message: String,
    cause: Option<BoxError>,
    context: Option<BoxError>,
}

impl Failure {
    /// Create a failure with no links.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
            context: None,
        }
    }

    /// Record the explicit cause of this failure.
    pub fn caused_by(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Record the failure that was being handled when this one was raised.
    pub fn while_handling(mut self, context: impl Into<BoxError>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The failure's own message, without any linked failures.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The next link in the chain, explicit cause first.
    pub fn link(&self) -> Link<'_> {
        if let Some(cause) = &self.cause {
            Link::Cause(&**cause)
        } else if let Some(context) = &self.context {
            Link::Context(&**context)
        } else {
            Link::None
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.link().target()
    }
}

/// How one failure refers to the previous one in its chain.
#[derive(Debug, Clone, Copy)]
pub enum Link<'a> {
    /// Raised because of this error
    Cause(&'a (dyn StdError + 'static)),
    /// Raised while this error was being handled
    Context(&'a (dyn StdError + 'static)),
    /// End of the chain
    None,
}

impl<'a> Link<'a> {
    /// Find the link leaving `err`.
    ///
    /// [`Failure`]s (bare, inside [`Error::Failure`] or wrapped in an
    /// [`io::Error`]) report their own link kind. For any other error,
    /// `source()` is treated as an explicit cause.
    pub fn of(err: &'a (dyn StdError + 'static)) -> Self {
        if let Some(failure) = as_failure(err) {
            return failure.link();
        }
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if let Some(failure) = io_err.get_ref().and_then(|inner| as_failure(inner)) {
                return failure.link();
            }
        }
        match err.source() {
            Some(source) => Link::Cause(source),
            None => Link::None,
        }
    }

    /// The linked error, if any.
    pub fn target(self) -> Option<&'a (dyn StdError + 'static)> {
        match self {
            Link::Cause(err) | Link::Context(err) => Some(err),
            Link::None => None,
        }
    }
}

fn as_failure<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a Failure> {
    match err.downcast_ref::<Error>() {
        Some(Error::Failure(failure)) => Some(failure),
        _ => err.downcast_ref::<Failure>(),
    }
}

/// Join the message of `err` with those of every failure chained behind it.
///
/// Messages are listed newest first, one per line. Explicit causes are
/// prefixed with `Caused by: `, incidental context with
/// `Raised while handling: `.
pub fn failure_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err;
    loop {
        current = match Link::of(current) {
            Link::Cause(next) => {
                parts.push(format!("Caused by: {next}"));
                next
            }
            Link::Context(next) => {
                parts.push(format!("Raised while handling: {next}"));
                next
            }
            Link::None => break,
        };
    }
    parts.join("\n")
}

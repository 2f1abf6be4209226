//! Retry settings loaded from configuration files.

use std::error::Error as StdError;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::controller::{DEFAULT_DELAY, DEFAULT_TRIES, RetryBuilder};
use crate::error::{Error, Result};

/// Static retry options as they appear in a configuration file.
///
/// Every field is optional and falls back to the controller defaults.
///
/// ```toml
/// tries = 5
/// delay_secs = 0.5
/// backoff_mode = "power"
/// failure_message = "Unable to reach the API"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total number of attempts
    pub tries: u32,
    /// Base delay in seconds
    pub delay_secs: f64,
    /// Backoff curve name
    pub backoff_mode: String,
    /// Message logged with every retryable failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            tries: DEFAULT_TRIES,
            delay_secs: DEFAULT_DELAY.as_secs_f64(),
            backoff_mode: super::BackoffMode::default().to_string(),
            failure_message: None,
        }
    }
}

impl RetryConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not valid TOML or has
    /// unexpected fields.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Start a [`RetryBuilder`] from these options.
    ///
    /// The backoff mode name is checked when the wrapped operation is called,
    /// like every other policy field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPolicy`] if `delay_secs` is negative or not a
    /// finite number.
    ///
    /// # Examples
    ///
    /// ```
    /// use infrakit_core::error::Error;
    /// use infrakit_core::retry::RetryConfig;
    ///
    /// let config = RetryConfig::from_toml_str("tries = 2\nbackoff_mode = \"linear\"").unwrap();
    /// let retry = config.builder::<(), Error>().unwrap().build();
    /// ```
    pub fn builder<A, E>(&self) -> Result<RetryBuilder<A, E>>
    where
        E: StdError + 'static,
    {
        let delay = Duration::try_from_secs_f64(self.delay_secs).map_err(|_| {
            Error::InvalidPolicy(format!(
                "Delay must be a non-negative number of seconds, got {}",
                self.delay_secs
            ))
        })?;

        let mut builder = RetryBuilder::default()
            .tries(self.tries)
            .delay(delay)
            .backoff_mode_name(&self.backoff_mode);
        if let Some(message) = &self.failure_message {
            builder = builder.failure_message(message.clone());
        }
        Ok(builder)
    }
}

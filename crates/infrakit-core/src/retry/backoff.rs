//! Backoff curves.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the wait between attempts grows.
///
/// For a base delay `d` and the 1-based index `N` of the attempt that just
/// failed:
///
/// ```text
/// constant:    d           => 3, 3,  3,  3,   3, ...
/// linear:      d * N       => 3, 6,  9, 12,  15, ...
/// power:       d * 2^(N-1) => 3, 6, 12, 24,  48, ...
/// exponential: d^N         => 3, 9, 27, 81, 243, ...  (d must be >= 1s)
/// ```
///
/// Note that `power` uses a zero-based exponent while `exponential` uses a
/// one-based one, so both start at `d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffMode {
    /// Always wait the base delay
    Constant,
    /// Wait the base delay times the attempt index
    Linear,
    /// Double the wait after every attempt
    Power,
    /// Raise the base delay (in seconds) to the attempt index
    #[default]
    Exponential,
}

impl BackoffMode {
    /// All modes, in documentation order.
    pub const ALL: [BackoffMode; 4] = [
        BackoffMode::Constant,
        BackoffMode::Linear,
        BackoffMode::Power,
        BackoffMode::Exponential,
    ];

    /// The textual name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            BackoffMode::Constant => "constant",
            BackoffMode::Linear => "linear",
            BackoffMode::Power => "power",
            BackoffMode::Exponential => "exponential",
        }
    }

    /// Sleep in seconds after the `index`-th (1-based) failed attempt.
    pub fn sleep_secs(self, base: f64, index: u32) -> f64 {
        match self {
            BackoffMode::Constant => base,
            BackoffMode::Linear => base * f64::from(index),
            BackoffMode::Power => base * 2f64.powi(exponent(index) - 1),
            BackoffMode::Exponential => base.powi(exponent(index)),
        }
    }

    /// Sleep after the `index`-th (1-based) failed attempt.
    ///
    /// Saturates at [`Duration::MAX`] when the curve outgrows it.
    pub fn sleep(self, base: Duration, index: u32) -> Duration {
        if base.is_zero() {
            return Duration::ZERO;
        }
        let exact = match self {
            BackoffMode::Constant => Some(base),
            BackoffMode::Linear => base.checked_mul(index),
            BackoffMode::Power => index
                .checked_sub(1)
                .and_then(|exp| 2u32.checked_pow(exp))
                .and_then(|factor| base.checked_mul(factor)),
            BackoffMode::Exponential if index == 1 => Some(base),
            BackoffMode::Exponential => None,
        };
        exact.unwrap_or_else(|| {
            let secs = self.sleep_secs(base.as_secs_f64(), index);
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        })
    }
}

fn exponent(index: u32) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

impl fmt::Display for BackoffMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackoffMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BackoffMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| Error::UnknownBackoffMode(s.to_string()))
    }
}

/// Calculate the sleep in seconds for the `index`-th (1-based) failed attempt.
///
/// This is the textual entry point, for callers holding a mode name rather
/// than a [`BackoffMode`].
///
/// # Errors
///
/// Returns [`Error::UnknownBackoffMode`] if `backoff_mode` is not one of
/// `constant`, `linear`, `power` or `exponential`.
///
/// # Examples
///
/// ```
/// use infrakit_core::retry::backoff_sleep;
///
/// assert_eq!(backoff_sleep("power", 3.0, 4).unwrap(), 24.0);
/// assert!(backoff_sleep("invalid", 1.0, 5).is_err());
/// ```
pub fn backoff_sleep(backoff_mode: &str, base: f64, index: u32) -> Result<f64> {
    Ok(backoff_mode.parse::<BackoffMode>()?.sleep_secs(base, index))
}

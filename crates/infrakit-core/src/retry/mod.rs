//! Retry controller with configurable backoff.
//!
//! Wraps an idempotent operation and calls it again when it fails with one of
//! the configured [`FailureKind`]s, waiting between attempts according to a
//! [`BackoffMode`].
//!
//! # Key Types
//!
//! - [`retry`] - Wrap an operation with the default settings
//! - [`Retry`] / [`RetryBuilder`] - Configure a controller, then wrap operations with it
//! - [`RetryPolicy`] - The resolved parameters of one call
//! - [`BackoffMode`] - Constant, linear, power or exponential curves
//! - [`Sleeper`] - How the controller waits between attempts
//! - [`RetryConfig`] - Settings loaded from TOML
//!
//! # Examples
//!
//! ```rust
//! use infrakit_core::error::Error;
//! use infrakit_core::retry::{BackoffMode, RecordingSleeper, Retry};
//! use std::cell::Cell;
//! use std::time::Duration;
//!
//! let sleeper = RecordingSleeper::new();
//! let attempts = Cell::new(0);
//!
//! let check = Retry::builder()
//!     .tries(4)
//!     .delay(Duration::from_secs(3))
//!     .backoff_mode(BackoffMode::Power)
//!     .sleeper(sleeper.clone())
//!     .build()
//!     .wrap(|host: &&str| {
//!         attempts.set(attempts.get() + 1);
//!         if attempts.get() < 3 {
//!             Err(Error::failure(format!("{host} not ready")))
//!         } else {
//!             Ok(())
//!         }
//!     });
//!
//! check.call("db1001").unwrap();
//! assert_eq!(attempts.get(), 3);
//! assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(3), Duration::from_secs(6)]);
//! ```

mod backoff;
mod config;
mod controller;
mod policy;
mod sleep;

pub use backoff::{BackoffMode, backoff_sleep};
pub use config::RetryConfig;
pub use controller::{DEFAULT_DELAY, DEFAULT_TRIES, Retry, RetryBuilder, Retrying, retry};
pub use policy::{FailureKind, Operation, RetryPolicy};
pub use sleep::{RecordingSleeper, Sleeper, ThreadSleeper};

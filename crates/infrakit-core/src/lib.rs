#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Support library for infrastructure automation.
//!
//! This crate provides small building blocks for automation scripts:
//!
//! - **Retry controller** via [`retry::retry`] and [`retry::Retry`]
//!   - Constant, linear, power and exponential backoff
//!   - Retryable failure kinds chosen per wrapper
//!   - Per-call policy adjusters
//! - **Chained failures** via [`error::Failure`], logged with their full
//!   cause/context chain
//! - **Exclusive file locking** via [`fileio::locked_open`]
//!
//! Everything here is synchronous: waits block the calling thread.
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use infrakit_core::prelude::*;
//! use std::time::Duration;
//!
//! let sleeper = RecordingSleeper::new();
//! let lookup = Retry::builder()
//!     .tries(3)
//!     .delay(Duration::from_secs(1))
//!     .backoff_mode(BackoffMode::Linear)
//!     .sleeper(sleeper.clone())
//!     .build()
//!     .wrap(|name: &&str| Ok::<_, Error>(name.len()));
//!
//! assert_eq!(lookup.call("example.org").unwrap(), 11);
//! assert!(sleeper.sleeps().is_empty());
//! ```

pub mod error;
pub mod fileio;
pub mod retry;

/// Convenient re-exports of commonly used items.
///
/// Import everything with:
///
/// ```rust
/// use infrakit_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Failure, failure_chain};
    pub use crate::fileio::{DEFAULT_LOCK_TIMEOUT, LockedFile, locked_open};
    pub use crate::retry::{
        BackoffMode, FailureKind, RecordingSleeper, Retry, RetryBuilder, RetryConfig, RetryPolicy,
        Retrying, Sleeper, retry,
    };
}

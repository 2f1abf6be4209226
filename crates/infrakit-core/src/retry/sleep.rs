//! Waiting between attempts.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Performs the wait between two attempts.
///
/// The retry controller is synchronous: a sleeper blocks the calling thread.
/// Swap in a [`RecordingSleeper`] to observe the requested waits without
/// actually waiting.
pub trait Sleeper: Send + Sync {
    /// Block the current thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread with [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested sleeps and returns immediately.
///
/// Clones share the same record, so a clone can be handed to a retry
/// controller while another is kept for assertions.
///
/// # Examples
///
/// ```
/// use infrakit_core::retry::{RecordingSleeper, Sleeper};
/// use std::time::Duration;
///
/// let sleeper = RecordingSleeper::new();
/// sleeper.clone().sleep(Duration::from_secs(30));
///
/// assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(30)]);
/// ```
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Create a sleeper with an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of sleeps requested so far.
    pub fn count(&self) -> usize {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

impl fmt::Debug for RecordingSleeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSleeper")
            .field("sleeps", &self.sleeps())
            .finish()
    }
}

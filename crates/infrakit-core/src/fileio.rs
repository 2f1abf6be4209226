//! Exclusive file locking.
//!
//! [`locked_open`] opens a file and polls for an exclusive, non-blocking lock
//! on it through the retry controller. The lock is held until the returned
//! [`LockedFile`] is dropped.

use std::fs::{File, OpenOptions};
use std::io;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::retry::{BackoffMode, FailureKind, Retry, Sleeper, ThreadSleeper};

/// Number of lock attempts made within the timeout.
pub const LOCK_TRIES: u32 = 10;

/// Default total time to wait for the lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// An open file holding an exclusive lock.
///
/// Dereferences to [`File`]. The lock is released when the value is dropped.
#[derive(Debug)]
pub struct LockedFile {
    file: File,
    path: PathBuf,
}

impl LockedFile {
    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Deref for LockedFile {
    type Target = File;

    fn deref(&self) -> &File {
        &self.file
    }
}

impl DerefMut for LockedFile {
    fn deref_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        match self.file.unlock() {
            Ok(()) => debug!(path = %self.path.display(), "Released exclusive lock"),
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "Failed to release exclusive lock"
            ),
        }
    }
}

/// Open `path` with `options` and take an exclusive lock on it.
///
/// Makes [`LOCK_TRIES`] attempts, spaced evenly over `timeout`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened and [`Error::Lock`] if
/// the lock is still held elsewhere after the last attempt.
///
/// # Examples
///
/// ```no_run
/// use infrakit_core::fileio::{DEFAULT_LOCK_TIMEOUT, locked_open};
/// use std::fs::OpenOptions;
/// use std::io::Write;
///
/// # fn main() -> infrakit_core::error::Result<()> {
/// let mut file = locked_open(
///     "/var/lib/cookbooks/state.json",
///     OpenOptions::new().write(true).create(true).truncate(true),
///     DEFAULT_LOCK_TIMEOUT,
/// )?;
/// file.write_all(b"{}")?;
/// # Ok(())
/// # }
/// ```
pub fn locked_open(
    path: impl AsRef<Path>,
    options: &OpenOptions,
    timeout: Duration,
) -> Result<LockedFile> {
    locked_open_with(path.as_ref(), options, timeout, ThreadSleeper)
}

/// Like [`locked_open`], waiting between attempts with `sleeper`.
pub fn locked_open_with(
    path: impl AsRef<Path>,
    options: &OpenOptions,
    timeout: Duration,
    sleeper: impl Sleeper + 'static,
) -> Result<LockedFile> {
    let path = path.as_ref();
    let file = options.open(path)?;

    let locked = {
        let acquire = Retry::builder()
            .tries(LOCK_TRIES)
            .delay(timeout / LOCK_TRIES)
            .backoff_mode(BackoffMode::Constant)
            .retry_on(FailureKind::new("resource unavailable", |err: &io::Error| {
                err.kind() == io::ErrorKind::WouldBlock
            }))
            .sleeper(sleeper)
            .build()
            .wrap_named("fileio.try_lock", |file: &&File| {
                file.try_lock().map_err(io::Error::from)
            });
        acquire.call(&file)
    };
    locked.map_err(|source| Error::Lock {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Acquired exclusive lock");

    Ok(LockedFile {
        file,
        path: path.to_path_buf(),
    })
}

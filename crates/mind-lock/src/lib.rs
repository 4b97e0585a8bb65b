//! Sidecar-file mutual exclusion using `flock(2)` directly.
//! Independent crate with no internal mind dependencies.
//!
//! A lock is an exclusive advisory `flock` on `<memory path>.lock`. The
//! guard owns the `File` carrying the lock; `Drop` calls `flock(fd, LOCK_UN)`
//! so every exit path of a critical section releases it, including early
//! returns, errors, and cancelled futures.
//!
//! Acquisition never blocks in the kernel: it polls with `LOCK_NB` and a
//! short, growing back-off until a bounded retry budget is spent.
//!
//! Each holder writes a `{pid, acquired_at}` diagnostic after locking and
//! clears it before unlocking. A lock counts as stale only when that
//! diagnostic is older than the stale threshold and its pid is still alive:
//! a dead holder's flock is already gone, and an empty or unreadable
//! diagnostic belongs to a holder that has not written one yet. The sidecar
//! of a stale holder is unlinked so the next attempt locks a fresh inode.
//! After every successful `flock` the guard checks that the path still names
//! the inode it locked, which keeps a stolen lock from being shared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io::{Read, Seek, Write};
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A lock held longer than this is considered abandoned.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRIES: u32 = 100;
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_millis(5);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(50);

#[derive(thiserror::Error, Debug)]
pub enum LockError {
    #[error("Timed out acquiring lock {} after {attempts} attempts", path.display())]
    Timeout { path: PathBuf, attempts: u32 },

    #[error("Lock file I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Retry and staleness policy for [`acquire`] and [`with_lock`].
#[derive(Debug, Clone)]
pub struct LockOptions {
    pub stale_after: Duration,
    pub retries: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
    /// Multiplier applied to the back-off after each failed attempt.
    pub backoff_factor: f64,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            retries: DEFAULT_RETRIES,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_factor: 1.2,
        }
    }
}

/// Diagnostic information written to lock files
#[derive(Debug, Serialize, Deserialize)]
struct LockDiagnostic {
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Exclusive lock guard backed by `flock(2)`.
pub struct FileLock {
    /// The open lock file. Closing it also releases flock, but we call
    /// `LOCK_UN` explicitly in `Drop` for deterministic release timing.
    file: File,
    lock_path: PathBuf,
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLock")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(err) = self.file.set_len(0) {
            tracing::debug!(
                path = %self.lock_path.display(),
                error = %err,
                "failed to clear lock diagnostic"
            );
        }
        let fd = self.file.as_raw_fd();
        // SAFETY: `fd` is a valid file descriptor owned by `self.file`.
        // `LOCK_UN` releases the advisory lock. If the call fails the lock is
        // still released when the fd is closed moments later.
        unsafe {
            libc::flock(fd, libc::LOCK_UN);
        }
        tracing::trace!(path = %self.lock_path.display(), "lock released");
    }
}

impl FileLock {
    /// Get the path to the lock file
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn write_diagnostic(&mut self) -> std::io::Result<()> {
        let diagnostic = LockDiagnostic {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let json = serde_json::to_string(&diagnostic)?;
        self.file.set_len(0)?;
        self.file.rewind()?;
        self.file.write_all(json.as_bytes())?;
        self.file.flush()
    }
}

/// Sidecar lock path for a memory file: `<memory path>.lock`.
pub fn sidecar_path(memory_path: &Path) -> PathBuf {
    let mut name = memory_path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Run `critical_section` exactly once while holding the lock at `lock_path`.
///
/// The guard is dropped after the section's future resolves, whatever its
/// result. Acquisition failure is converted into the caller's error type and
/// the section is not run.
pub async fn with_lock<T, E, F, Fut>(
    lock_path: &Path,
    options: &LockOptions,
    critical_section: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LockError>,
{
    let guard = acquire(lock_path, options).await?;
    let result = critical_section().await;
    drop(guard);
    result
}

/// Acquire the lock at `lock_path`, polling until the retry budget is spent.
///
/// Creates the parent directory and the sidecar file when absent.
pub async fn acquire(lock_path: &Path, options: &LockOptions) -> Result<FileLock, LockError> {
    if let Some(parent) = lock_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| LockError::io(parent, err))?;
    }

    let mut backoff = options.min_backoff;
    let attempts = options.retries.saturating_add(1);

    for attempt in 0..attempts {
        if let Some(lock) = try_acquire(lock_path)? {
            if attempt > 0 {
                tracing::debug!(
                    path = %lock_path.display(),
                    attempt,
                    "lock acquired after contention"
                );
            }
            return Ok(lock);
        }

        if holder_is_stale(lock_path, options.stale_after) {
            tracing::warn!(
                path = %lock_path.display(),
                stale_after_secs = options.stale_after.as_secs(),
                "breaking stale lock"
            );
            match fs::remove_file(lock_path) {
                Ok(()) => continue,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(LockError::io(lock_path, err)),
            }
        }

        if attempt + 1 < attempts {
            tokio::time::sleep(backoff).await;
            backoff = backoff
                .mul_f64(options.backoff_factor.max(1.0))
                .min(options.max_backoff);
        }
    }

    Err(LockError::Timeout {
        path: lock_path.to_path_buf(),
        attempts,
    })
}

/// One non-blocking acquisition attempt. `Ok(None)` means "held elsewhere".
fn try_acquire(lock_path: &Path) -> Result<Option<FileLock>, LockError> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|err| LockError::io(lock_path, err))?;

    let fd = file.as_raw_fd();

    // SAFETY: `fd` is a valid file descriptor from the `File` we just opened.
    // `LOCK_EX | LOCK_NB` requests an exclusive non-blocking lock.
    let ret = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return match err.raw_os_error() {
            Some(code) if code == libc::EWOULDBLOCK || code == libc::EINTR => Ok(None),
            _ => Err(LockError::io(lock_path, err)),
        };
    }

    let mut lock = FileLock {
        file,
        lock_path: lock_path.to_path_buf(),
    };

    // The sidecar may have been unlinked by a stale-lock breaker between our
    // open and our flock. Holding a lock on an orphaned inode excludes nobody.
    if !still_linked(&lock.file, lock_path) {
        return Ok(None);
    }

    if let Err(err) = lock.write_diagnostic() {
        tracing::debug!(
            path = %lock_path.display(),
            error = %err,
            "failed to write lock diagnostic"
        );
    }

    Ok(Some(lock))
}

fn still_linked(file: &File, lock_path: &Path) -> bool {
    match (file.metadata(), fs::metadata(lock_path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}

fn read_diagnostic(lock_path: &Path) -> Option<LockDiagnostic> {
    let mut contents = String::new();
    File::open(lock_path)
        .ok()?
        .read_to_string(&mut contents)
        .ok()?;
    serde_json::from_str(&contents).ok()
}

/// Check if a process is alive.
fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 checks existence without sending a signal.
    // EPERM means process exists but we lack permission to signal it.
    let ret = unsafe { libc::kill(pid, 0) };
    ret == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// A holder is stale when its own diagnostic is old and its process still
/// runs. Without a diagnostic there is nothing to judge, so it is not stale.
fn holder_is_stale(lock_path: &Path, stale_after: Duration) -> bool {
    let Some(diagnostic) = read_diagnostic(lock_path) else {
        return false;
    };
    let old = (Utc::now() - diagnostic.acquired_at)
        .to_std()
        .is_ok_and(|age| age > stale_after);
    old && is_process_alive(diagnostic.pid)
}

//! Single-writer lock for revloop log directories
//!
//! The JSON logs are rewritten whole on every append, so two processes
//! writing the same log directory would silently drop each other's entries.
//! Long-running commands take an exclusive advisory lock on the directory
//! before touching its logs. The lock coordinates revloop processes; it is not
//! a security boundary.

use camino::{Utf8Path, Utf8PathBuf};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// File name of the lock inside the log directory.
pub const LOCK_FILE_NAME: &str = ".lock";

/// Lock information stored in the lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID that created the lock
    pub pid: u32,
    /// Seconds since UNIX epoch when the lock was created
    pub created_at: u64,
    /// Log directory being locked
    pub log_dir: String,
    /// Subcommand holding the lock (`review`, `watch`, `apply`, ...)
    pub command: String,
    /// revloop version that created the lock
    pub revloop_version: String,
}

/// Lock errors for log directory locking
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "Log directory '{log_dir}' is in use by another revloop process (PID {pid}, created {created_ago} ago)"
    )]
    ConcurrentExecution {
        log_dir: String,
        pid: u32,
        created_ago: String,
    },

    #[error("Lock file is corrupted or invalid: {reason}")]
    CorruptedLock { reason: String },

    #[error("Failed to acquire lock: {reason}")]
    AcquisitionFailed { reason: String },

    #[error("Failed to release lock: {reason}")]
    ReleaseFailed { reason: String },

    #[error("IO error during lock operation: {0}")]
    Io(#[from] io::Error),
}

/// Exclusive lock on a log directory, released on drop.
pub struct LogDirLock {
    lock_path: PathBuf,
    _fd_lock: Option<Box<RwLock<fs::File>>>,
    lock_info: LockInfo,
}

impl LogDirLock {
    /// Acquire the lock for `log_dir`, creating the directory if needed.
    ///
    /// An existing lock whose process is gone is reclaimed. A lock held by a
    /// live process fails with [`LockError::ConcurrentExecution`] unless
    /// `force` is set. Creation uses `create_new` so two racing processes
    /// cannot both win.
    pub fn acquire(log_dir: &Utf8Path, command: &str, force: bool) -> Result<Self, LockError> {
        fs::create_dir_all(log_dir).map_err(|e| LockError::AcquisitionFailed {
            reason: format!("Failed to create log directory {log_dir}: {e}"),
        })?;

        let lock_path = Self::lock_path(log_dir);
        const MAX_ATTEMPTS: u32 = 3;

        for attempt in 0..MAX_ATTEMPTS {
            let lock_info = LockInfo {
                pid: process::id(),
                created_at: now_secs(),
                log_dir: log_dir.to_string(),
                command: command.to_string(),
                revloop_version: env!("CARGO_PKG_VERSION").to_string(),
            };

            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&lock_path)
            {
                Ok(lock_file) => return Self::finalize(lock_path, lock_file, lock_info),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Self::check_existing(&lock_path, log_dir, force)?;
                    Self::remove_stale(&lock_path)?;
                    if attempt + 1 < MAX_ATTEMPTS {
                        std::thread::sleep(std::time::Duration::from_millis(
                            10 * u64::from(attempt + 1),
                        ));
                    }
                }
                Err(e) => {
                    return Err(LockError::AcquisitionFailed {
                        reason: format!(
                            "Failed to create lock file at '{}': {e}",
                            lock_path.display()
                        ),
                    });
                }
            }
        }

        Err(LockError::AcquisitionFailed {
            reason: format!(
                "Another process re-created the lock for '{log_dir}' after {MAX_ATTEMPTS} attempts"
            ),
        })
    }

    /// Information about the current holder of the lock for `log_dir`, if any.
    pub fn holder(log_dir: &Utf8Path) -> Result<Option<LockInfo>, LockError> {
        let lock_path = Self::lock_path(log_dir);
        match fs::read_to_string(&lock_path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| LockError::CorruptedLock {
                    reason: format!("Failed to parse lock file: {e}"),
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LockError::CorruptedLock {
                reason: format!("Failed to read lock file: {e}"),
            }),
        }
    }

    /// Release the lock explicitly (also done on drop).
    pub fn release(mut self) -> Result<(), LockError> {
        self._fd_lock.take();
        match fs::remove_file(&self.lock_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::ReleaseFailed {
                reason: format!("Failed to remove lock file: {e}"),
            }),
        }
    }

    #[must_use]
    pub const fn lock_info(&self) -> &LockInfo {
        &self.lock_info
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    fn lock_path(log_dir: &Utf8Path) -> PathBuf {
        Utf8PathBuf::from(log_dir)
            .join(LOCK_FILE_NAME)
            .into_std_path_buf()
    }

    fn finalize(lock_path: PathBuf, lock_file: fs::File, lock_info: LockInfo) -> Result<Self, LockError> {
        let lock_json =
            serde_json::to_string_pretty(&lock_info).map_err(|e| LockError::AcquisitionFailed {
                reason: format!("Failed to serialize lock info: {e}"),
            })?;

        let mut rw_lock = Box::new(RwLock::new(lock_file));
        {
            let fd_lock = rw_lock
                .try_write()
                .map_err(|_| LockError::ConcurrentExecution {
                    log_dir: lock_info.log_dir.clone(),
                    pid: 0,
                    created_ago: "unknown".to_string(),
                })?;

            let mut file_ref = &*fd_lock;
            file_ref.write_all(lock_json.as_bytes())?;
            file_ref.flush()?;
            file_ref.sync_all()?;
        }

        Ok(Self {
            lock_path,
            _fd_lock: Some(rw_lock),
            lock_info,
        })
    }

    /// Decide whether an existing lock may be replaced. Returns `Ok(())` when
    /// the caller should remove it and retry.
    fn check_existing(lock_path: &Path, log_dir: &Utf8Path, force: bool) -> Result<(), LockError> {
        const MAX_READ_RETRIES: u32 = 3;
        const READ_RETRY_DELAY_MS: u64 = 10;

        for attempt in 0..MAX_READ_RETRIES {
            let content = match fs::read_to_string(lock_path) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                Err(e) => {
                    if attempt + 1 < MAX_READ_RETRIES {
                        std::thread::sleep(std::time::Duration::from_millis(READ_RETRY_DELAY_MS));
                        continue;
                    }
                    return Err(LockError::CorruptedLock {
                        reason: format!("Failed to read existing lock for '{log_dir}': {e}"),
                    });
                }
            };

            // The holder may have created the file but not written it yet.
            let parsed = serde_json::from_str::<LockInfo>(&content);
            let partial = content.trim().is_empty()
                || parsed.as_ref().is_err_and(serde_json::Error::is_eof);
            if partial && attempt + 1 < MAX_READ_RETRIES {
                std::thread::sleep(std::time::Duration::from_millis(READ_RETRY_DELAY_MS));
                continue;
            }

            let existing = match parsed {
                Ok(existing) => existing,
                Err(_) if force => return Ok(()),
                Err(e) => {
                    return Err(LockError::CorruptedLock {
                        reason: format!("Failed to parse existing lock for '{log_dir}': {e}"),
                    });
                }
            };

            if !is_process_running(existing.pid) {
                warn!(
                    pid = existing.pid,
                    log_dir = %log_dir,
                    "Reclaiming lock left behind by a process that is no longer running"
                );
                return Ok(());
            }
            if force {
                warn!(pid = existing.pid, log_dir = %log_dir, "Overriding lock held by a running process (--force)");
                return Ok(());
            }
            return Err(LockError::ConcurrentExecution {
                log_dir: log_dir.to_string(),
                pid: existing.pid,
                created_ago: format_duration_since(existing.created_at),
            });
        }

        Err(LockError::CorruptedLock {
            reason: format!("Lock file for '{log_dir}' stayed unreadable"),
        })
    }

    /// Rename-then-delete so a concurrent reader never sees a half-removed lock.
    fn remove_stale(lock_path: &Path) -> Result<(), LockError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let stale_path = lock_path.with_extension(format!("stale.{millis}.{}", process::id()));

        match fs::rename(lock_path, &stale_path) {
            Ok(()) => {
                let _ = fs::remove_file(&stale_path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::AcquisitionFailed {
                reason: format!("Failed to remove stale lock: {e}"),
            }),
        }
    }
}

impl std::fmt::Debug for LogDirLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogDirLock")
            .field("lock_path", &self.lock_path)
            .field("lock_info", &self.lock_info)
            .field("_fd_lock", &"<RwLock>")
            .finish()
    }
}

impl Drop for LogDirLock {
    fn drop(&mut self) {
        self._fd_lock.take();
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = i32::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        // kill(pid, 0) probes without signalling; EPERM means it exists.
        let rc = unsafe { libc::kill(pid, 0) };
        if rc == 0 {
            true
        } else {
            matches!(
                io::Error::last_os_error().raw_os_error(),
                Some(code) if code == libc::EPERM
            )
        }
    }

    #[cfg(not(unix))]
    {
        // Without a portable probe, a foreign lock counts as held.
        pid != 0
    }
}

/// Human-readable age of a timestamp (`42s`, `5m`, `3h`, `2d`).
fn format_duration_since(timestamp: u64) -> String {
    let duration = now_secs().saturating_sub(timestamp);

    if duration < 60 {
        format!("{duration}s")
    } else if duration < 3600 {
        format!("{}m", duration / 60)
    } else if duration < 86400 {
        format!("{}h", duration / 3600)
    } else {
        format!("{}d", duration / 86400)
    }
}

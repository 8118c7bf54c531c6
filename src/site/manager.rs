//! The site lock manager.

use super::exit::Terminator;
use super::paths::LockPaths;
use crate::error::{Result, SiteLockError};
use chrono::{DateTime, Duration, Utc};
use filetime::FileTime;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::Path;

/// Process-wide site lock over the filesystem.
///
/// Exactly one instance exists per process. Construction runs stale-lock
/// reclamation once; afterwards the instance moves between two states:
/// unlocked (no handle held) and locked (exclusive advisory lock held on the
/// lock file, flag file present and fresh). Contention never surfaces as an
/// error - the injected [`Terminator`] is invoked instead.
///
/// The open file handle representing the OS lock is exclusively owned by
/// this instance; releasing it (or process death) is what frees the site
/// for the next acquirer.
pub struct SiteLockManager {
    /// Derived lock artifact paths.
    paths: LockPaths,

    /// Maximum trusted age of the flag file.
    max_age: Duration,

    /// Injected "terminate this process" action.
    terminator: Box<dyn Terminator>,

    /// Live handle to the advisory-locked file while the lock is held.
    lock_handle: Option<File>,

    /// Whether construction reclaimed a stale lock.
    reclaimed: bool,
}

impl SiteLockManager {
    /// Construct the manager and reclaim a stale lock if one is left over.
    ///
    /// If both the lock file and the flag file exist and the flag file's
    /// modification time is older than `now - max_age`, the previous holder
    /// is treated as crashed and both files are deleted unconditionally.
    /// A missing or still-fresh flag file leaves any existing files
    /// untouched - a healthy lock may legitimately be held by another live
    /// process. This is the only place stale locks are cleaned.
    ///
    /// # Errors
    ///
    /// Returns [`SiteLockError::EnvironmentError`] on filesystem failures.
    pub fn new(
        paths: LockPaths,
        max_age: Duration,
        terminator: Box<dyn Terminator>,
    ) -> Result<Self> {
        let mut manager = Self {
            paths,
            max_age,
            terminator,
            lock_handle: None,
            reclaimed: false,
        };
        manager.reclaimed = manager.reclaim_stale_lock()?;
        Ok(manager)
    }

    /// Whether construction reclaimed a stale lock.
    pub fn reclaimed_stale_lock(&self) -> bool {
        self.reclaimed
    }

    /// Whether this instance currently holds the exclusive OS lock.
    pub fn holds_lock(&self) -> bool {
        self.lock_handle.is_some()
    }

    /// Check whether the site is flagged as locked.
    ///
    /// Pure existence check on the flag file: no age evaluation, no lock
    /// syscall, no side effects. This is intentionally the cheapest possible
    /// check, safe to call on every incoming request. It is best-effort by
    /// design and can briefly disagree with the real OS lock.
    pub fn is_site_locked(&self) -> bool {
        self.paths.flag_file.exists()
    }

    /// Terminate the process if the site is flagged as locked.
    ///
    /// Invokes the injected terminator exactly once when the flag file
    /// exists; otherwise returns with no side effect. Used as a cheap guard
    /// at the top of request handling to shed load while another process
    /// holds the lock, without paying for the lock syscall.
    pub fn exit_if_site_locked(&self) {
        if self.is_site_locked() {
            self.terminator.terminate();
        }
    }

    /// Acquire the site lock, terminating the process on contention.
    ///
    /// Creates the lock directory and the lock file if absent, then attempts
    /// an exclusive, non-blocking advisory lock. If another process already
    /// holds it, the injected terminator is invoked and the flag file is
    /// left untouched. On success the handle is retained for the remainder
    /// of the process lifetime (until [`unlock_site`](Self::unlock_site))
    /// and the flag file's modification time is unconditionally refreshed,
    /// keeping the staleness clock accurate for other processes even when
    /// the flag file already existed.
    ///
    /// Calling this while already holding the lock is an idempotent success
    /// that only refreshes the flag file timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`SiteLockError::EnvironmentError`] on filesystem failures.
    /// Contention is not an error.
    pub fn lock_site_or_exit(&mut self) -> Result<()> {
        if self.lock_handle.is_some() {
            return self.touch_flag_file();
        }

        fs::create_dir_all(&self.paths.lock_dir).map_err(|e| {
            SiteLockError::EnvironmentError(format!(
                "failed to create lock directory '{}': {}",
                self.paths.lock_dir.display(),
                e
            ))
        })?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.paths.lock_file)
            .map_err(|e| {
                SiteLockError::EnvironmentError(format!(
                    "failed to open lock file '{}': {}",
                    self.paths.lock_file.display(),
                    e
                ))
            })?;

        if let Err(e) = fs2::FileExt::try_lock_exclusive(&file) {
            if e.kind() == fs2::lock_contended_error().kind() {
                // Another live process holds the site lock.
                self.terminator.terminate();
                return Ok(());
            }
            return Err(SiteLockError::EnvironmentError(format!(
                "failed to lock '{}': {}",
                self.paths.lock_file.display(),
                e
            )));
        }

        self.lock_handle = Some(file);
        self.touch_flag_file()
    }

    /// Release the site lock.
    ///
    /// Idempotent: releases and closes the OS lock handle if one is held,
    /// then deletes the flag file if it exists. Calling this without a held
    /// lock or without a flag file is a no-op, never an error. The lock file
    /// itself is never deleted here - deleting and recreating its path could
    /// let a third process briefly lock a different inode than the one still
    /// referenced by a stale open handle elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`SiteLockError::EnvironmentError`] on filesystem failures.
    pub fn unlock_site(&mut self) -> Result<()> {
        if let Some(file) = self.lock_handle.take() {
            fs2::FileExt::unlock(&file).map_err(|e| {
                SiteLockError::EnvironmentError(format!(
                    "failed to release lock on '{}': {}",
                    self.paths.lock_file.display(),
                    e
                ))
            })?;
        }

        remove_if_exists(&self.paths.flag_file)
    }

    /// Delete both artifacts if the flag file has outlived the maximum age.
    ///
    /// Returns whether a reclamation happened.
    fn reclaim_stale_lock(&self) -> Result<bool> {
        if !self.paths.lock_file.exists() {
            return Ok(false);
        }

        let Some(age) = flag_file_age(&self.paths.flag_file)? else {
            return Ok(false);
        };

        if age <= self.max_age {
            return Ok(false);
        }

        remove_if_exists(&self.paths.lock_file)?;
        remove_if_exists(&self.paths.flag_file)?;
        Ok(true)
    }

    /// Ensure the flag file exists and set its modification time to now.
    fn touch_flag_file(&self) -> Result<()> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.paths.flag_file)
            .map_err(|e| {
                SiteLockError::EnvironmentError(format!(
                    "failed to create flag file '{}': {}",
                    self.paths.flag_file.display(),
                    e
                ))
            })?;

        filetime::set_file_mtime(&self.paths.flag_file, FileTime::now()).map_err(|e| {
            SiteLockError::EnvironmentError(format!(
                "failed to update flag file timestamp '{}': {}",
                self.paths.flag_file.display(),
                e
            ))
        })
    }
}

/// Age of the flag file, or `None` if it does not exist.
pub(crate) fn flag_file_age(flag_file: &Path) -> Result<Option<Duration>> {
    let metadata = match fs::metadata(flag_file) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(SiteLockError::EnvironmentError(format!(
                "failed to stat flag file '{}': {}",
                flag_file.display(),
                e
            )));
        }
    };

    let modified = metadata.modified().map_err(|e| {
        SiteLockError::EnvironmentError(format!(
            "failed to read modification time of '{}': {}",
            flag_file.display(),
            e
        ))
    })?;

    let age = Utc::now().signed_duration_since(DateTime::<Utc>::from(modified));
    Ok(Some(age))
}

/// Remove a file, treating absence as success.
pub(crate) fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SiteLockError::EnvironmentError(format!(
            "failed to remove '{}': {}",
            path.display(),
            e
        ))),
    }
}

//! Site locking subsystem for sitelock.
//!
//! This module implements process-wide mutual exclusion over the filesystem,
//! so that independent OS processes (one per request in the common deployment
//! model) can serialize non-reentrant maintenance operations without a
//! database or external coordination service.
//!
//! # Lock Artifacts
//!
//! Two sibling files live in the configured lock directory, named after a
//! deterministic fingerprint of the application root:
//!
//! - `<fingerprint>_Lock` - the advisory lock file. Holding an exclusive,
//!   non-blocking OS lock on it is the actual mutual-exclusion primitive.
//!   Its content is meaningless and it is never deleted on unlock, only
//!   during stale-lock reclamation.
//! - `<fingerprint>_IsLocked` - the flag file. Its existence answers
//!   "is the site locked" without the lock syscall, and its modification
//!   time drives stale-lock reclamation.
//!
//! # Staleness
//!
//! A crashed or killed holder leaves both files behind. Construction of the
//! [`SiteLockManager`] reclaims them when the flag file is older than the
//! configured maximum age; a fresh flag file is trusted and left alone.
//!
//! # Termination
//!
//! Contention is not an error. A process that loses the non-blocking lock
//! race, or observes the flag file in [`SiteLockManager::exit_if_site_locked`],
//! is terminated through an injected [`Terminator`] so the surrounding
//! runtime decides the exit mechanism.

mod exit;
mod manager;
mod paths;


// Re-export public API
pub use exit::{ProcessTerminator, Terminator};
pub use manager::SiteLockManager;
pub use paths::LockPaths;

pub(crate) use manager::{flag_file_age, remove_if_exists};

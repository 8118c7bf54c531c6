//! Lock path derivation.

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Filename suffix of the advisory lock file.
const LOCK_FILE_SUFFIX: &str = "_Lock";

/// Filename suffix of the flag file.
const FLAG_FILE_SUFFIX: &str = "_IsLocked";

/// Resolved lock artifact paths for one application instance.
///
/// This is the path-provider capability handed to the manager: constructing
/// it is the only place lock filenames are computed. Both files share a
/// fingerprint derived from the application root path, so distinct
/// application instances on the same host never collide and the same
/// instance always computes the same paths.
#[derive(Debug, Clone)]
pub struct LockPaths {
    /// Directory containing the lock artifacts.
    pub lock_dir: PathBuf,

    /// The advisory lock file (`<fingerprint>_Lock`).
    pub lock_file: PathBuf,

    /// The flag file (`<fingerprint>_IsLocked`).
    pub flag_file: PathBuf,
}

impl LockPaths {
    /// Derive the lock paths for an application root inside `lock_dir`.
    pub fn derive(lock_dir: impl Into<PathBuf>, application_root: &Path) -> Self {
        let lock_dir = lock_dir.into();
        let fingerprint = Self::fingerprint(application_root);
        let lock_file = lock_dir.join(format!("{}{}", fingerprint, LOCK_FILE_SUFFIX));
        let flag_file = lock_dir.join(format!("{}{}", fingerprint, FLAG_FILE_SUFFIX));

        Self {
            lock_dir,
            lock_file,
            flag_file,
        }
    }

    /// Compute the deterministic fingerprint of an application root path.
    ///
    /// UUIDv5 over the raw path bytes, rendered as 32 lowercase hex
    /// characters without hyphens.
    pub fn fingerprint(application_root: &Path) -> String {
        Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            application_root.as_os_str().as_encoded_bytes(),
        )
        .simple()
        .to_string()
    }
}

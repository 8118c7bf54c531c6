//! Exit code constants for the sitelock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config)
//! - 2: Environment failure (filesystem errors)
//! - 3: Guarded command failure
//! - 4: Site locked (contention or positive locked-check)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// Environment failure: directory/file creation or permission errors.
pub const ENVIRONMENT_FAILURE: i32 = 2;

/// Guarded command failure: the command run under the lock failed.
pub const COMMAND_FAILURE: i32 = 3;

/// Site locked: the lock is held by another process.
pub const SITE_LOCKED: i32 = 4;

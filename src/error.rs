//! Error types for the sitelock CLI.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for sitelock operations.
///
/// Each variant maps to a specific exit code. Contention is deliberately not
/// represented here: a contended site terminates the process through the
/// injected terminator (exit code 4) before any error could be returned.
#[derive(Error, Debug)]
pub enum SiteLockError {
    /// User provided invalid arguments or configuration.
    #[error("{0}")]
    UserError(String),

    /// Filesystem failure: an unrecoverable environment problem, never
    /// contention.
    #[error("Environment failure: {0}")]
    EnvironmentError(String),

    /// A guarded command could not be executed or reported failure.
    #[error("Guarded command failed: {0}")]
    CommandError(String),
}

impl SiteLockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SiteLockError::UserError(_) => exit_codes::USER_ERROR,
            SiteLockError::EnvironmentError(_) => exit_codes::ENVIRONMENT_FAILURE,
            SiteLockError::CommandError(_) => exit_codes::COMMAND_FAILURE,
        }
    }
}

/// Result type alias for sitelock operations.
pub type Result<T> = std::result::Result<T, SiteLockError>;

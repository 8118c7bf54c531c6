//! Event logging subsystem for sitelock.
//!
//! Lock lifecycle transitions are appended to an NDJSON audit log (one JSON
//! object per line) named `events.ndjson` inside the lock directory. The log
//! is best-effort: commands warn on stderr when an append fails but never
//! fail because of it, since the lock artifacts are the source of truth.
//!
//! # Event Format
//!
//! Each event is a JSON object with the following fields:
//! - `ts`: RFC3339 timestamp
//! - `action`: The lifecycle action (acquire, release, reclaim, clear)
//! - `actor`: The owner string (e.g., `user@HOST`)
//! - `details`: Freeform object with action-specific details

use crate::error::{Result, SiteLockError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Filename of the audit log inside the lock directory.
const EVENTS_FILE_NAME: &str = "events.ndjson";

/// Lock lifecycle actions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Site lock acquired
    Acquire,
    /// Site lock released
    Release,
    /// Stale lock reclaimed at construction
    Reclaim,
    /// Lock artifacts cleared manually
    Clear,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Acquire => write!(f, "acquire"),
            EventAction::Release => write!(f, "release"),
            EventAction::Reclaim => write!(f, "reclaim"),
            EventAction::Clear => write!(f, "clear"),
        }
    }
}

/// An event record for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// The actor who performed the action (e.g., `user@HOST`).
    pub actor: String,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event with the given action.
    ///
    /// The timestamp is set to the current time, and the actor is
    /// determined from the environment (USER@HOSTNAME).
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_actor_string(),
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the details object for this event.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            SiteLockError::EnvironmentError(format!("failed to serialize event to JSON: {}", e))
        })
    }
}

/// Get the actor string for event metadata.
fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Get the path to the events file for a lock directory.
pub fn events_file_path(lock_dir: &Path) -> PathBuf {
    lock_dir.join(EVENTS_FILE_NAME)
}

/// Append an event to the audit log in the given lock directory.
///
/// The lock directory and the events file are created if they do not exist.
/// Each append results in one JSON line with a trailing newline.
pub fn append_event(lock_dir: &Path, event: &Event) -> Result<()> {
    let events_file = events_file_path(lock_dir);
    let json_line = event.to_ndjson_line()?;

    if !lock_dir.exists() {
        fs::create_dir_all(lock_dir).map_err(|e| {
            SiteLockError::EnvironmentError(format!(
                "failed to create lock directory '{}': {}",
                lock_dir.display(),
                e
            ))
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&events_file)
        .map_err(|e| {
            SiteLockError::EnvironmentError(format!(
                "failed to open events file '{}': {}",
                events_file.display(),
                e
            ))
        })?;

    writeln!(file, "{}", json_line).map_err(|e| {
        SiteLockError::EnvironmentError(format!(
            "failed to write event to '{}': {}",
            events_file.display(),
            e
        ))
    })?;

    Ok(())
}

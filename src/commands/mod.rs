//! Command implementations for sitelock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, plus the settings-resolution layer that merges CLI
//! flags, the optional config file, and defaults into concrete lock paths.

use crate::cli::{ClearArgs, Cli, Command, RunArgs};
use crate::config::Config;
use crate::error::{Result, SiteLockError};
use crate::events::{Event, EventAction, append_event};
use crate::exit_codes;
use crate::site::{
    LockPaths, ProcessTerminator, SiteLockManager, flag_file_age, remove_if_exists,
};
use chrono::Duration;
use serde_json::json;
use std::env;
use std::path::PathBuf;

/// Default lock directory name under the application root.
pub const DEFAULT_LOCK_DIR_NAME: &str = ".sitelock";

/// Config filename looked up inside the lock directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Largest accepted maximum age in seconds.
///
/// `chrono::Duration::seconds` is only defined up to `i64::MAX / 1000`;
/// anything larger must be rejected at resolution time instead of reaching
/// the duration constructor.
const MAX_MAX_AGE_SECONDS: u64 = (i64::MAX / 1000) as u64;

/// Resolved settings for one invocation.
///
/// Precedence for every value: CLI flag, then config file, then default.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Application root whose lock namespace is used.
    pub application_root: PathBuf,

    /// Derived lock artifact paths.
    pub paths: LockPaths,

    /// Maximum flag-file age in seconds.
    pub max_age_seconds: u64,

    /// Whether lifecycle events are appended to the audit log.
    pub events_log: bool,
}

impl Settings {
    /// Resolve settings from CLI flags.
    pub fn resolve(
        root: Option<PathBuf>,
        lock_dir: Option<PathBuf>,
        max_age: Option<u64>,
        config_path: Option<PathBuf>,
    ) -> Result<Self> {
        let application_root = match root {
            Some(root) => root,
            None => env::current_dir().map_err(|e| {
                SiteLockError::EnvironmentError(format!(
                    "failed to get current working directory: {}",
                    e
                ))
            })?,
        };

        // An explicit --config must exist; the default location is optional.
        let config = match &config_path {
            Some(path) => Config::load(path)?,
            None => {
                let default_dir = lock_dir
                    .clone()
                    .unwrap_or_else(|| application_root.join(DEFAULT_LOCK_DIR_NAME));
                let candidate = default_dir.join(CONFIG_FILE_NAME);
                if candidate.is_file() {
                    Config::load(&candidate)?
                } else {
                    Config::default()
                }
            }
        };

        let lock_dir = lock_dir
            .or(config.lock_dir)
            .unwrap_or_else(|| application_root.join(DEFAULT_LOCK_DIR_NAME));

        let max_age_seconds = max_age.unwrap_or(config.max_age_seconds);
        if max_age_seconds == 0 {
            return Err(SiteLockError::UserError(
                "--max-age must be greater than 0".to_string(),
            ));
        }
        if max_age_seconds > MAX_MAX_AGE_SECONDS {
            return Err(SiteLockError::UserError(format!(
                "--max-age must be at most {} seconds (got {})",
                MAX_MAX_AGE_SECONDS, max_age_seconds
            )));
        }

        let paths = LockPaths::derive(lock_dir, &application_root);

        Ok(Self {
            application_root,
            paths,
            max_age_seconds,
            events_log: config.events_log,
        })
    }

    /// The maximum flag-file age as a duration.
    pub fn max_age(&self) -> Duration {
        Duration::seconds(self.max_age_seconds as i64)
    }
}

/// Dispatch a command to its implementation.
///
/// This is the main entry point for command execution. Each command
/// is routed to its handler function.
pub fn dispatch(cli: Cli) -> Result<()> {
    let settings = Settings::resolve(cli.root, cli.lock_dir, cli.max_age, cli.config)?;

    match cli.command {
        Command::Status => cmd_status(&settings),
        Command::Check => cmd_check(&settings),
        Command::Run(args) => cmd_run(&settings, args),
        Command::Clear(args) => cmd_clear(&settings, args),
    }
}

/// Construct the site lock manager that exits with `SITE_LOCKED` on contention.
fn build_manager(settings: &Settings) -> Result<SiteLockManager> {
    let manager = SiteLockManager::new(
        settings.paths.clone(),
        settings.max_age(),
        Box::new(ProcessTerminator::new(exit_codes::SITE_LOCKED)),
    )?;

    if manager.reclaimed_stale_lock() {
        log_event(
            settings,
            Event::new(EventAction::Reclaim).with_details(json!({
                "lock_file": settings.paths.lock_file.display().to_string(),
                "max_age_seconds": settings.max_age_seconds,
            })),
        );
        eprintln!("Note: reclaimed a stale site lock left by a crashed process.");
    }

    Ok(manager)
}

/// Append an event to the audit log, warning on failure instead of failing.
fn log_event(settings: &Settings, event: Event) {
    if !settings.events_log {
        return;
    }
    if let Err(e) = append_event(&settings.paths.lock_dir, &event) {
        eprintln!("Warning: failed to log {} event: {}", event.action, e);
    }
}

fn cmd_status(settings: &Settings) -> Result<()> {
    let paths = &settings.paths;
    let flag_age = flag_file_age(&paths.flag_file)?;

    println!("Site lock status:");
    println!("  Application root: {}", settings.application_root.display());
    println!("  Lock directory:   {}", paths.lock_dir.display());
    println!(
        "  Lock file:        {} ({})",
        paths.lock_file.display(),
        if paths.lock_file.exists() {
            "present"
        } else {
            "absent"
        }
    );
    println!(
        "  Flag file:        {} ({})",
        paths.flag_file.display(),
        if paths.flag_file.exists() {
            "present"
        } else {
            "absent"
        }
    );
    println!();

    match flag_age {
        Some(age) => {
            let seconds = age.num_seconds();
            println!("Site is LOCKED (flag age: {}s)", seconds);
            if seconds > settings.max_age_seconds as i64 {
                println!(
                    "Flag is STALE (exceeds {}s threshold); the next acquisition will reclaim it.",
                    settings.max_age_seconds
                );
            }
        }
        None => println!("Site is not locked."),
    }

    Ok(())
}

fn cmd_check(settings: &Settings) -> Result<()> {
    let manager = build_manager(settings)?;
    manager.exit_if_site_locked();

    println!("Site is not locked.");
    Ok(())
}

fn cmd_run(settings: &Settings, args: RunArgs) -> Result<()> {
    let mut manager = build_manager(settings)?;

    manager.lock_site_or_exit()?;
    log_event(
        settings,
        Event::new(EventAction::Acquire).with_details(json!({
            "pid": std::process::id(),
            "command": args.command,
        })),
    );

    let command_result = run_guarded_command(&args.command);

    // The lock must be released on every exit path of the guarded command.
    let was_held = manager.holds_lock();
    let unlock_result = manager.unlock_site();
    log_event(
        settings,
        Event::new(EventAction::Release).with_details(json!({
            "pid": std::process::id(),
            "was_held": was_held,
            "command_ok": command_result.is_ok(),
        })),
    );

    command_result?;
    unlock_result
}

/// Parse and execute the guarded command, inheriting stdio.
fn run_guarded_command(command: &str) -> Result<()> {
    let command = command.trim();
    if command.is_empty() {
        return Err(SiteLockError::UserError("command is empty".to_string()));
    }

    let args = shell_words::split(command).map_err(|e| {
        SiteLockError::UserError(format!(
            "failed to parse command: {}\nCommand: {}\nFix: check for unmatched quotes or invalid escape sequences.",
            e, command
        ))
    })?;

    if args.is_empty() {
        return Err(SiteLockError::UserError(format!(
            "command is empty after parsing.\nCommand: {}",
            command
        )));
    }

    let program = &args[0];
    let cmd_args = &args[1..];

    let status = std::process::Command::new(program)
        .args(cmd_args)
        .status()
        .map_err(|e| {
            SiteLockError::CommandError(format!(
                "failed to execute command: {}\nCommand: {}\nFix: ensure the command is installed and in PATH.",
                e, command
            ))
        })?;

    if !status.success() {
        return Err(SiteLockError::CommandError(format!(
            "command exited with {}\nCommand: {}",
            status, command
        )));
    }

    Ok(())
}

fn cmd_clear(settings: &Settings, args: ClearArgs) -> Result<()> {
    // Require --force flag
    if !args.force {
        return Err(SiteLockError::UserError(
            "refusing to clear the site lock without --force flag.\n\n\
             Clearing the lock can corrupt a maintenance operation if the holder is still active.\n\
             Only clear the lock if you are certain the holder has crashed.\n\n\
             To clear the lock, run:\n  sitelock clear --force"
                .to_string(),
        ));
    }

    let paths = &settings.paths;
    let flag_age = flag_file_age(&paths.flag_file)?;
    let had_lock_file = paths.lock_file.exists();
    let had_flag_file = paths.flag_file.exists();

    if !had_lock_file && !had_flag_file {
        println!("No lock artifacts to clear.");
        return Ok(());
    }

    remove_if_exists(&paths.lock_file)?;
    remove_if_exists(&paths.flag_file)?;

    log_event(
        settings,
        Event::new(EventAction::Clear).with_details(json!({
            "had_lock_file": had_lock_file,
            "had_flag_file": had_flag_file,
            "flag_age_seconds": flag_age.map(|a| a.num_seconds()),
            "force": args.force,
        })),
    );

    println!("Cleared site lock artifacts:");
    if had_lock_file {
        println!("  Removed lock file: {}", paths.lock_file.display());
    }
    if had_flag_file {
        println!("  Removed flag file: {}", paths.flag_file.display());
        if let Some(age) = flag_age {
            println!("  Flag age was:      {}s", age.num_seconds());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn test_settings(temp_dir: &TempDir) -> Settings {
        Settings::resolve(Some(temp_dir.path().to_path_buf()), None, None, None).unwrap()
    }

    #[test]
    fn settings_default_lock_dir_is_under_root() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        assert_eq!(
            settings.paths.lock_dir,
            temp_dir.path().join(DEFAULT_LOCK_DIR_NAME)
        );
        assert_eq!(
            settings.max_age_seconds,
            crate::config::DEFAULT_MAX_AGE_SECONDS
        );
        assert!(settings.events_log);
    }

    #[test]
    fn settings_cli_lock_dir_overrides_default() {
        let temp_dir = TempDir::new().unwrap();
        let lock_dir = temp_dir.path().join("locks");
        let settings = Settings::resolve(
            Some(temp_dir.path().to_path_buf()),
            Some(lock_dir.clone()),
            None,
            None,
        )
        .unwrap();

        assert_eq!(settings.paths.lock_dir, lock_dir);
    }

    #[test]
    fn settings_reads_config_from_lock_dir() {
        let temp_dir = TempDir::new().unwrap();
        let lock_dir = temp_dir.path().join(DEFAULT_LOCK_DIR_NAME);
        fs::create_dir_all(&lock_dir).unwrap();
        fs::write(
            lock_dir.join(CONFIG_FILE_NAME),
            "max_age_seconds: 300\nevents_log: false\n",
        )
        .unwrap();

        let settings = test_settings(&temp_dir);

        assert_eq!(settings.max_age_seconds, 300);
        assert!(!settings.events_log);
    }

    #[test]
    fn settings_cli_max_age_overrides_config() {
        let temp_dir = TempDir::new().unwrap();
        let lock_dir = temp_dir.path().join(DEFAULT_LOCK_DIR_NAME);
        fs::create_dir_all(&lock_dir).unwrap();
        fs::write(lock_dir.join(CONFIG_FILE_NAME), "max_age_seconds: 300\n").unwrap();

        let settings =
            Settings::resolve(Some(temp_dir.path().to_path_buf()), None, Some(45), None).unwrap();

        assert_eq!(settings.max_age_seconds, 45);
    }

    #[test]
    fn settings_rejects_zero_max_age() {
        let temp_dir = TempDir::new().unwrap();
        let result = Settings::resolve(Some(temp_dir.path().to_path_buf()), None, Some(0), None);

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn settings_rejects_out_of_range_max_age() {
        let temp_dir = TempDir::new().unwrap();

        // Would overflow chrono::Duration::seconds if it got that far.
        let result = Settings::resolve(
            Some(temp_dir.path().to_path_buf()),
            None,
            Some(10_000_000_000_000_000_000),
            None,
        );

        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        assert!(err.to_string().contains("--max-age"));
    }

    #[test]
    fn settings_accepts_largest_valid_max_age() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::resolve(
            Some(temp_dir.path().to_path_buf()),
            None,
            Some(MAX_MAX_AGE_SECONDS),
            None,
        )
        .unwrap();

        assert_eq!(settings.max_age().num_seconds(), MAX_MAX_AGE_SECONDS as i64);
    }

    #[test]
    fn settings_explicit_config_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let result = Settings::resolve(
            Some(temp_dir.path().to_path_buf()),
            None,
            None,
            Some(temp_dir.path().join("missing.yaml")),
        );

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn status_succeeds_on_unlocked_site() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        assert!(cmd_status(&settings).is_ok());
    }

    #[test]
    fn status_succeeds_on_locked_site() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        fs::create_dir_all(&settings.paths.lock_dir).unwrap();
        fs::write(&settings.paths.flag_file, "").unwrap();

        assert!(cmd_status(&settings).is_ok());
    }

    #[test]
    fn clear_refuses_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        let result = cmd_clear(&settings, ClearArgs { force: false });
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        assert!(err.to_string().contains("--force"));
    }

    #[test]
    fn clear_with_force_removes_both_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        fs::create_dir_all(&settings.paths.lock_dir).unwrap();
        fs::write(&settings.paths.lock_file, "").unwrap();
        fs::write(&settings.paths.flag_file, "").unwrap();

        cmd_clear(&settings, ClearArgs { force: true }).unwrap();

        assert!(!settings.paths.lock_file.exists());
        assert!(!settings.paths.flag_file.exists());
    }

    #[test]
    fn clear_with_force_is_a_noop_without_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        assert!(cmd_clear(&settings, ClearArgs { force: true }).is_ok());
    }

    #[test]
    fn clear_appends_event_to_audit_log() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        fs::create_dir_all(&settings.paths.lock_dir).unwrap();
        fs::write(&settings.paths.flag_file, "").unwrap();

        cmd_clear(&settings, ClearArgs { force: true }).unwrap();

        let events_file = crate::events::events_file_path(&settings.paths.lock_dir);
        let content = fs::read_to_string(events_file).unwrap();
        assert!(content.contains("\"clear\""));
        assert!(content.contains("\"had_flag_file\":true"));
    }

    #[test]
    fn run_executes_command_and_releases_lock() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        cmd_run(
            &settings,
            RunArgs {
                command: "true".to_string(),
            },
        )
        .unwrap();

        // Lock file persists, flag file is gone, lock is re-acquirable.
        assert!(settings.paths.lock_file.exists());
        assert!(!settings.paths.flag_file.exists());

        cmd_run(
            &settings,
            RunArgs {
                command: "true".to_string(),
            },
        )
        .unwrap();
    }

    #[test]
    fn run_failing_command_still_releases_lock() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        let result = cmd_run(
            &settings,
            RunArgs {
                command: "false".to_string(),
            },
        );

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().exit_code(), exit_codes::COMMAND_FAILURE);
        assert!(!settings.paths.flag_file.exists());
    }

    #[test]
    fn run_logs_acquire_and_release_events() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        cmd_run(
            &settings,
            RunArgs {
                command: "true".to_string(),
            },
        )
        .unwrap();

        let events_file = crate::events::events_file_path(&settings.paths.lock_dir);
        let content = fs::read_to_string(events_file).unwrap();
        assert!(content.contains("\"acquire\""));
        assert!(content.contains("\"release\""));
    }

    #[test]
    fn run_rejects_empty_command() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        let result = cmd_run(
            &settings,
            RunArgs {
                command: "   ".to_string(),
            },
        );

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn run_missing_program_is_a_command_error() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        let result = cmd_run(
            &settings,
            RunArgs {
                command: "sitelock-no-such-program-xyzzy".to_string(),
            },
        );

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().exit_code(), exit_codes::COMMAND_FAILURE);
        // The lock must still have been released.
        assert!(!settings.paths.flag_file.exists());
    }

    #[test]
    fn check_succeeds_on_unlocked_site() {
        let temp_dir = TempDir::new().unwrap();
        let settings = test_settings(&temp_dir);

        assert!(cmd_check(&settings).is_ok());
    }
}

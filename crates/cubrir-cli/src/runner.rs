//! External test command execution
//!
//! The command runs with `CUBRIR_DATA_DIR` set, so every instrumented thread
//! in it writes its ambient session to a fragment file on exit.

use crate::error::{CliError, CliResult};
use cubrir::tracer::DATA_DIR_ENV;
use std::path::Path;
use std::process::{Command, ExitStatus};

/// Command run when none is given
pub const DEFAULT_COMMAND: [&str; 2] = ["cargo", "test"];

/// A test command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCommand {
    program: String,
    args: Vec<String>,
}

impl TestCommand {
    /// Build from trailing arguments, defaulting to `cargo test`
    #[must_use]
    pub fn from_args(command: &[String]) -> Self {
        match command.split_first() {
            Some((program, args)) => Self {
                program: program.clone(),
                args: args.to_vec(),
            },
            None => Self {
                program: DEFAULT_COMMAND[0].to_string(),
                args: DEFAULT_COMMAND[1..].iter().map(ToString::to_string).collect(),
            },
        }
    }

    /// Command line as typed
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run in `root` with fragments going to `fragment_dir`, inheriting stdio
    pub fn run(&self, root: &Path, fragment_dir: &Path) -> CliResult<ExitStatus> {
        tracing::info!(command = %self.display(), fragments = %fragment_dir.display(), "starting test command");
        Command::new(&self.program)
            .args(&self.args)
            .current_dir(root)
            .env(DATA_DIR_ENV, fragment_dir)
            .status()
            .map_err(|source| CliError::Spawn {
                command: self.display(),
                source,
            })
    }
}

/// Empty `dir`, creating it if needed
pub fn prepare_fragment_dir(dir: &Path) -> CliResult<()> {
    if dir.exists() {
        tracing::debug!(dir = %dir.display(), "clearing stale fragments");
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Short description of how a command ended
#[must_use]
pub fn describe_status(status: ExitStatus) -> String {
    status
        .code()
        .map_or_else(|| "terminated by a signal".to_string(), |code| format!("exit status {code}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let command = TestCommand::from_args(&[]);
        assert_eq!(command.display(), "cargo test");
    }

    #[test]
    fn test_explicit_command() {
        let args: Vec<String> = ["cargo", "nextest", "run"].iter().map(ToString::to_string).collect();
        let command = TestCommand::from_args(&args);
        assert_eq!(command.display(), "cargo nextest run");
    }

    #[test]
    fn test_prepare_clears_old_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let fragments = dir.path().join("coverage.json.d");
        std::fs::create_dir_all(&fragments).unwrap();
        std::fs::write(fragments.join("session-old.json"), "{}").unwrap();

        prepare_fragment_dir(&fragments).unwrap();
        assert!(fragments.is_dir());
        assert_eq!(std::fs::read_dir(&fragments).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_passes_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let fragments = dir.path().join("frags");
        let args: Vec<String> = ["sh", "-c", "test -n \"$CUBRIR_DATA_DIR\""]
            .iter()
            .map(ToString::to_string)
            .collect();
        let status = TestCommand::from_args(&args).run(dir.path(), &fragments).unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_status() {
        let dir = tempfile::tempdir().unwrap();
        let args: Vec<String> = ["sh", "-c", "exit 3"].iter().map(ToString::to_string).collect();
        let status = TestCommand::from_args(&args).run(dir.path(), dir.path()).unwrap();
        assert!(!status.success());
        assert_eq!(describe_status(status), "exit status 3");
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = vec!["cubridor-no-such-program-xyz".to_string()];
        let err = TestCommand::from_args(&args).run(dir.path(), dir.path()).unwrap_err();
        assert!(matches!(err, CliError::Spawn { .. }));
    }
}

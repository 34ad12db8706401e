//! Run command handler

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use crate::runner::{describe_status, prepare_fragment_dir, TestCommand};
use crate::RunArgs;
use cubrir::{CoverageStore, UnitRegistry};
use std::time::{Duration, Instant};

/// What a measured run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Command line that ran
    pub command: String,
    /// Whether the command exited successfully
    pub tests_passed: bool,
    /// How the command ended
    pub status: String,
    /// Sessions recorded from fragments
    pub sessions: usize,
    /// Units discovered
    pub units: usize,
    /// Wall time
    pub duration: Duration,
}

impl RunOutcome {
    /// `Err(TestsFailed)` when the command failed
    pub fn into_result(self) -> CliResult<Self> {
        if self.tests_passed {
            Ok(self)
        } else {
            Err(CliError::tests_failed(format!("`{}` ended with {}", self.command, self.status)))
        }
    }
}

/// Run the test command under instrumentation and persist the store
///
/// Data is stored even when the command fails, so partial runs can still be
/// reported on.
pub fn measure(
    config: &CliConfig,
    append: bool,
    command: &[String],
    reporter: &mut ProgressReporter,
) -> CliResult<RunOutcome> {
    let started = Instant::now();
    let registry = UnitRegistry::discover(&config.root, &config.coverage)?;
    if registry.is_empty() {
        reporter.warning("no source files found under the configured source roots");
    }

    let data_file = config.data_file();
    let mut store = if append {
        CoverageStore::load_or_default(&data_file)?
    } else {
        CoverageStore::new()
    };

    let fragments = config.fragment_dir();
    prepare_fragment_dir(&fragments)?;

    let test_command = TestCommand::from_args(command);
    reporter.info(&format!("Running `{}`", test_command.display()));
    let status = test_command.run(&config.root, &fragments)?;

    reporter.start_spinner("Recording sessions");
    let recorded = store.record_fragments(&fragments, &registry);
    reporter.finish_spinner();
    let sessions = recorded?;

    store.save(&data_file)?;
    if let Err(e) = std::fs::remove_dir_all(&fragments) {
        tracing::warn!(dir = %fragments.display(), error = %e, "could not remove fragment directory");
    }
    tracing::info!(sessions, units = registry.len(), data_file = %data_file.display(), "coverage stored");

    Ok(RunOutcome {
        command: test_command.display(),
        tests_passed: status.success(),
        status: describe_status(status),
        sessions,
        units: registry.len(),
        duration: started.elapsed(),
    })
}

/// Execute the run command
pub fn execute_run(config: &CliConfig, args: &RunArgs, reporter: &mut ProgressReporter) -> CliResult<()> {
    let outcome = measure(config, args.append, &args.command, reporter)?;
    reporter.run_summary(outcome.tests_passed, outcome.sessions, outcome.units, outcome.duration);
    if outcome.sessions == 0 {
        reporter.warning("no sessions were recorded; is the code under test annotated with #[cubrir::instrument]?");
    }
    outcome.into_result().map(|_| ())
}

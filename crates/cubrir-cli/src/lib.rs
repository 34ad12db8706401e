//! Cubridor: command-line front end for Cubrir
//!
//! Runs a test command with coverage collection enabled, stores the merged
//! hits, and renders text, HTML, and LCOV reports from the stored data.

#![warn(missing_docs)]

mod commands;
mod config;
pub mod error;
pub mod handlers;
mod output;
mod runner;

pub use commands::{
    AllArgs, Cli, ColorArg, CombineArgs, Commands, HtmlArgs, LcovArgs, ReportArgs, ReportFormat,
    RunArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
pub use runner::{TestCommand, DEFAULT_COMMAND};

use tracing_subscriber::EnvFilter;

/// Environment variable holding a log filter (`tracing` directive syntax)
pub const LOG_ENV: &str = "CUBRIR_LOG";

/// Install the stderr log subscriber
///
/// `CUBRIR_LOG` wins when set; otherwise the level follows `-v`/`-q`.
pub fn init_logging(verbosity: Verbosity, use_color: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(use_color)
        .with_target(false)
        .try_init();
}

/// Dispatch a parsed command
pub fn execute(command: &Commands, config: &CliConfig) -> CliResult<()> {
    let mut reporter = ProgressReporter::new(config.color.should_color(), config.verbosity.is_quiet());
    match command {
        Commands::Run(args) => handlers::execute_run(config, args, &mut reporter),
        Commands::Report(args) => handlers::execute_report(config, args),
        Commands::Html(args) => handlers::execute_html(config, args, &reporter),
        Commands::Lcov(args) => handlers::execute_lcov(config, args, &reporter),
        Commands::All(args) => handlers::execute_all(config, args, &mut reporter),
        Commands::Combine(args) => handlers::execute_combine(config, args, &reporter),
        Commands::Erase => handlers::execute_erase(config, &reporter),
    }
}

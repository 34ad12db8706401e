//! Cubridor CLI
//!
//! ## Usage
//!
//! ```bash
//! cubridor run                       # cargo test with coverage collection
//! cubridor run -- cargo test -p foo  # any test command
//! cubridor report -m                 # summary with missing lines
//! cubridor html --open               # browsable report
//! cubridor lcov -o lcov.info         # CI tracefile
//! ```

use clap::Parser;
use cubridor::{execute, init_logging, Cli, CliConfig, CliError, Verbosity};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: cubridor::ColorChoice = cli.color.into();
    init_logging(verbosity, color.should_color());

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let root = std::env::current_dir()?;
    let config = CliConfig::from_cli(cli, &root)?;
    execute(&cli.command, &config)
}

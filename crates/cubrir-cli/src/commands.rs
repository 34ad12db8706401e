//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Cubridor: run instrumented test suites and report line coverage
#[derive(Parser, Debug)]
#[command(name = "cubridor")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Configuration file (default: .cubrir.yaml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Coverage data file
    #[arg(long, global = true, value_name = "FILE", env = "CUBRIR_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Source root to measure (repeatable)
    #[arg(long, global = true, value_name = "DIR")]
    pub source: Vec<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a test command under instrumentation and store the hits
    Run(RunArgs),

    /// Print a coverage summary table
    Report(ReportArgs),

    /// Write the HTML report
    Html(HtmlArgs),

    /// Write an LCOV tracefile
    Lcov(LcovArgs),

    /// Run, then print the summary and write the HTML report
    All(AllArgs),

    /// Merge other data files (or leftover fragments) into the data file
    Combine(CombineArgs),

    /// Delete collected coverage data
    Erase,
}

/// Arguments for the run command
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Add to existing data instead of starting fresh
    #[arg(long)]
    pub append: bool,

    /// Command to run (default: cargo test)
    #[arg(last = true, value_name = "CMD")]
    pub command: Vec<String>,
}

/// Summary output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Fixed-width table
    #[default]
    Text,
    /// Aggregate report as JSON
    Json,
}

/// Arguments for the report command
#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Show line ranges that did not run
    #[arg(short = 'm', long)]
    pub show_missing: bool,

    /// Decimal places in percentages
    #[arg(long, value_name = "N")]
    pub precision: Option<usize>,

    /// Hide fully covered units
    #[arg(long)]
    pub skip_covered: bool,

    /// Exit with status 5 when total coverage is below this percentage
    #[arg(long, value_name = "PERCENT")]
    pub fail_under: Option<f64>,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ReportFormat,
}

/// Arguments for the html command
#[derive(Args, Debug, Clone, Default)]
pub struct HtmlArgs {
    /// Output directory
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Report title
    #[arg(long)]
    pub title: Option<String>,

    /// Use the dark theme
    #[arg(long)]
    pub dark: bool,

    /// Open the index page when done
    #[arg(long)]
    pub open: bool,
}

/// Arguments for the lcov command
#[derive(Args, Debug, Clone, Default)]
pub struct LcovArgs {
    /// Output file (stdout when omitted and not configured)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for the all command
#[derive(Args, Debug, Clone, Default)]
pub struct AllArgs {
    /// Show line ranges that did not run
    #[arg(short = 'm', long)]
    pub show_missing: bool,

    /// HTML output directory
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Add to existing data instead of starting fresh
    #[arg(long)]
    pub append: bool,

    /// Command to run (default: cargo test)
    #[arg(last = true, value_name = "CMD")]
    pub command: Vec<String>,
}

/// Arguments for the combine command
#[derive(Args, Debug, Clone, Default)]
pub struct CombineArgs {
    /// Data files to merge; without any, leftover session fragments are merged
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Keep the input files after merging
    #[arg(long)]
    pub keep: bool,
}

/// Color output argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Auto-detect
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

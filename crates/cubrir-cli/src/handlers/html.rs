//! HTML command handler

use super::report::load_report;
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use crate::HtmlArgs;
use cubrir::render::{HtmlFormatter, HtmlReportConfig, Theme};
use cubrir::AggregateReport;
use std::path::{Path, PathBuf};

/// Page configuration from configuration and flags
#[must_use]
pub fn html_config(config: &CliConfig, args: &HtmlArgs) -> HtmlReportConfig {
    HtmlReportConfig {
        title: args.title.clone().unwrap_or_else(|| config.coverage.html_title.clone()),
        theme: if args.dark { Theme::Dark } else { Theme::Light },
        precision: config.coverage.precision,
    }
}

/// Write the HTML report for `report` and return the index path
pub fn write_html(config: &CliConfig, args: &HtmlArgs, report: &AggregateReport) -> CliResult<PathBuf> {
    let dir = config.resolve(args.directory.as_deref().unwrap_or(config.coverage.html_dir.as_path()));
    let index = HtmlFormatter::new(report)
        .with_config(html_config(config, args))
        .write_to_dir(&dir)?;
    Ok(index)
}

/// Open a file with the platform's default handler
pub fn open_in_browser(path: &Path) {
    #[cfg(target_os = "macos")]
    let opened = std::process::Command::new("open").arg(path).spawn();
    #[cfg(target_os = "windows")]
    let opened = std::process::Command::new("cmd").args(["/C", "start", ""]).arg(path).spawn();
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let opened = std::process::Command::new("xdg-open").arg(path).spawn();

    if let Err(e) = opened {
        tracing::warn!(path = %path.display(), error = %e, "could not open report");
    }
}

/// Execute the html command
pub fn execute_html(config: &CliConfig, args: &HtmlArgs, reporter: &ProgressReporter) -> CliResult<()> {
    let report = load_report(config)?;
    let index = write_html(config, args, &report)?;
    reporter.success(&format!("Wrote HTML report to {}", index.display()));
    if args.open {
        open_in_browser(&index);
    }
    Ok(())
}

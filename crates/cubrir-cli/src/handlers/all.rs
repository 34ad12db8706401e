//! All command handler: run, then report

use super::html::write_html;
use super::report::{check_threshold, load_report, render_summary};
use super::run::measure;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use crate::{AllArgs, HtmlArgs, ReportFormat};
use cubrir::render::TextOptions;

fn report_stage(config: &CliConfig, args: &AllArgs, reporter: &ProgressReporter) -> CliResult<()> {
    let report = load_report(config)?;
    let options = TextOptions {
        precision: config.coverage.precision,
        show_missing: args.show_missing || config.coverage.show_missing,
        skip_covered: config.coverage.skip_covered,
    };
    print!("{}", render_summary(&report, ReportFormat::Text, options)?);

    let html_args = HtmlArgs {
        directory: args.directory.clone(),
        ..HtmlArgs::default()
    };
    let index = write_html(config, &html_args, &report)?;
    reporter.success(&format!("Wrote HTML report to {}", index.display()));

    check_threshold(&report, config.coverage.fail_under, options.precision)
}

/// Execute the all command
///
/// A failing test command decides the outcome on its own; report problems
/// after passing tests surface as report failures, never as test failures.
pub fn execute_all(config: &CliConfig, args: &AllArgs, reporter: &mut ProgressReporter) -> CliResult<()> {
    let outcome = measure(config, args.append, &args.command, reporter)?;
    reporter.run_summary(outcome.tests_passed, outcome.sessions, outcome.units, outcome.duration);

    let reported = report_stage(config, args, reporter);
    if !outcome.tests_passed {
        if let Err(e) = &reported {
            reporter.failure(&e.to_string());
        }
        return outcome.into_result().map(|_| ());
    }
    reported.map_err(|e| match e {
        CliError::BelowThreshold { .. } | CliError::ReportGeneration { .. } => e,
        other => CliError::report_generation(other.to_string()),
    })
}

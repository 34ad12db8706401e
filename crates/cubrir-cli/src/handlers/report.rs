//! Report command handler

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::{ReportArgs, ReportFormat};
use cubrir::config::MAX_PRECISION;
use cubrir::render::{TextFormatter, TextOptions};
use cubrir::{AggregateReport, CoverageStore, UnitRegistry};

/// Load the stored data and snapshot it against freshly identified units
pub fn load_report(config: &CliConfig) -> CliResult<AggregateReport> {
    let data_file = config.data_file();
    if !data_file.is_file() {
        return Err(CliError::NoData {
            path: data_file.display().to_string(),
        });
    }
    let store = CoverageStore::load(&data_file)?;
    let registry = UnitRegistry::discover(&config.root, &config.coverage)?;
    Ok(AggregateReport::snapshot(&store, &registry))
}

/// Text options from configuration and flags
pub fn text_options(config: &CliConfig, args: &ReportArgs) -> CliResult<TextOptions> {
    let precision = args.precision.unwrap_or(config.coverage.precision);
    if precision > MAX_PRECISION {
        return Err(CliError::config(format!(
            "--precision must be at most {MAX_PRECISION}, got {precision}"
        )));
    }
    Ok(TextOptions {
        precision,
        show_missing: args.show_missing || config.coverage.show_missing,
        skip_covered: args.skip_covered || config.coverage.skip_covered,
    })
}

/// Render the summary in the requested format
pub fn render_summary(report: &AggregateReport, format: ReportFormat, options: TextOptions) -> CliResult<String> {
    match format {
        ReportFormat::Text => Ok(TextFormatter::new(report).with_options(options).generate()),
        ReportFormat::Json => {
            let mut json = serde_json::to_string_pretty(report)?;
            json.push('\n');
            Ok(json)
        }
    }
}

/// `Err(BelowThreshold)` when the displayed total is under `threshold`
pub fn check_threshold(report: &AggregateReport, threshold: Option<f64>, precision: usize) -> CliResult<()> {
    let Some(required) = threshold else {
        return Ok(());
    };
    let total = report.totals().ratio();
    if total.below(required, precision) {
        return Err(CliError::BelowThreshold {
            actual: total.format(precision),
            required,
        });
    }
    Ok(())
}

/// Execute the report command
pub fn execute_report(config: &CliConfig, args: &ReportArgs) -> CliResult<()> {
    let options = text_options(config, args)?;
    let report = load_report(config)?;
    print!("{}", render_summary(&report, args.format, options)?);
    check_threshold(&report, args.fail_under.or(config.coverage.fail_under), options.precision)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use cubrir::UnitId;
    use std::path::Path;

    fn project(hits: &[u32]) -> (tempfile::TempDir, CliConfig) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src/lib.rs"),
            "pub fn a(n: u32) -> u32 {\n    let x = n;\n    if x > 2 {\n        return 0;\n    }\n    x + 1\n}\n",
        )
        .unwrap();
        let config = CliConfig::new().with_root(dir.path());
        let mut store = CoverageStore::new();
        store.insert_lines(UnitId::new("src/lib.rs"), hits.iter().copied());
        store.save(&config.data_file()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_missing_data_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::new().with_root(dir.path());
        let err = load_report(&config).unwrap_err();
        assert!(matches!(err, CliError::NoData { .. }));
        assert_eq!(err.exit_code(), crate::error::exit::OTHER);
    }

    #[test]
    fn test_text_summary_with_missing() {
        let (_dir, config) = project(&[2, 3, 6]);
        let report = load_report(&config).unwrap();
        let args = ReportArgs {
            show_missing: true,
            ..ReportArgs::default()
        };
        let text = render_summary(&report, ReportFormat::Text, text_options(&config, &args).unwrap()).unwrap();
        let row = text.lines().find(|l| l.starts_with("src/lib.rs")).unwrap();
        assert!(row.contains("75.00%"));
        assert!(row.ends_with('4'));
    }

    #[test]
    fn test_json_summary() {
        let (_dir, config) = project(&[2]);
        let report = load_report(&config).unwrap();
        let json = render_summary(&report, ReportFormat::Json, TextOptions::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["totals"]["statements"], 4);
        assert_eq!(value["totals"]["missed"], 3);
    }

    #[test]
    fn test_threshold() {
        let (_dir, config) = project(&[2, 3, 6]);
        let report = load_report(&config).unwrap();
        assert!(check_threshold(&report, None, 2).is_ok());
        assert!(check_threshold(&report, Some(75.0), 2).is_ok());
        let err = check_threshold(&report, Some(75.01), 2).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit::BELOW_THRESHOLD);
    }

    #[test]
    fn test_precision_limit() {
        let config = CliConfig::new().with_root(Path::new("."));
        let args = ReportArgs {
            precision: Some(9),
            ..ReportArgs::default()
        };
        assert!(text_options(&config, &args).is_err());
    }
}

//! LCOV command handler

use super::report::load_report;
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use crate::LcovArgs;
use cubrir::render::LcovFormatter;
use cubrir::AggregateReport;
use std::path::PathBuf;

/// Test name written to the `TN:` record: the project directory's name
#[must_use]
pub fn test_name(config: &CliConfig) -> String {
    config
        .root
        .canonicalize()
        .ok()
        .and_then(|root| root.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

/// Write the tracefile to the configured destination
///
/// Returns the file written, or `None` when the tracefile went to stdout.
pub fn write_lcov(config: &CliConfig, args: &LcovArgs, report: &AggregateReport) -> CliResult<Option<PathBuf>> {
    let formatter = LcovFormatter::new(report).with_test_name(test_name(config));
    match args.output.as_ref().or(config.coverage.lcov_file.as_ref()) {
        Some(path) => {
            let path = config.resolve(path);
            formatter.save(&path)?;
            Ok(Some(path))
        }
        None => {
            print!("{}", formatter.generate());
            Ok(None)
        }
    }
}

/// Execute the lcov command
pub fn execute_lcov(config: &CliConfig, args: &LcovArgs, reporter: &ProgressReporter) -> CliResult<()> {
    let report = load_report(config)?;
    if let Some(path) = write_lcov(config, args, &report)? {
        reporter.success(&format!("Wrote LCOV tracefile to {}", path.display()));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use cubrir::{CoverageStore, UnitId};

    #[test]
    fn test_writes_tracefile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn a() {\n    let _ = 1;\n    let _ = 2;\n}\n").unwrap();
        let config = CliConfig::new().with_root(dir.path());
        let mut store = CoverageStore::new();
        store.insert_lines(UnitId::new("src/lib.rs"), [3]);
        store.save(&config.data_file()).unwrap();

        let args = LcovArgs {
            output: Some(PathBuf::from("target/lcov.info")),
        };
        let reporter = ProgressReporter::new(false, true);
        execute_lcov(&config, &args, &reporter).unwrap();

        let lcov = std::fs::read_to_string(dir.path().join("target/lcov.info")).unwrap();
        assert!(lcov.contains("SF:src/lib.rs\nDA:2,0\nDA:3,1\nLF:2\nLH:1\nend_of_record"));
    }

    #[test]
    fn test_name_is_directory_name() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("widget");
        std::fs::create_dir_all(&project).unwrap();
        let config = CliConfig::new().with_root(&project);
        assert_eq!(test_name(&config), "widget");
    }
}

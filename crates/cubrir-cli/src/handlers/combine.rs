//! Combine command handler

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;
use crate::CombineArgs;
use cubrir::{CoverageStore, UnitRegistry};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Execute the combine command
///
/// With input files, each is loaded and merged into the data file. Without,
/// session fragments left behind by an interrupted run are recorded instead.
/// Inputs are removed after a successful save unless `--keep` is given.
pub fn execute_combine(config: &CliConfig, args: &CombineArgs, reporter: &ProgressReporter) -> CliResult<()> {
    let data_file = config.data_file();
    let mut store = CoverageStore::load_or_default(&data_file)?;

    if args.files.is_empty() {
        let fragments = config.fragment_dir();
        let registry = UnitRegistry::discover(&config.root, &config.coverage)?;
        let sessions = store.record_fragments(&fragments, &registry)?;
        if sessions == 0 {
            reporter.info("No session fragments to combine");
            return Ok(());
        }
        store.save(&data_file)?;
        if !args.keep {
            std::fs::remove_dir_all(&fragments)?;
        }
        reporter.success(&format!("Combined {sessions} session(s) into {}", data_file.display()));
        return Ok(());
    }

    // The same file named twice (or as `./name`) is merged and removed once
    let data_key = canonical(&data_file);
    let mut seen = HashSet::new();
    let inputs: Vec<PathBuf> = args
        .files
        .iter()
        .map(|f| config.resolve(f))
        .filter(|f| {
            let key = canonical(f);
            key != data_key && seen.insert(key)
        })
        .collect();
    for input in &inputs {
        let other = CoverageStore::load(input)?;
        tracing::debug!(input = %input.display(), hits = other.hit_count(), "merging data file");
        store.merge_from(&other);
    }
    store.save(&data_file)?;

    if !args.keep {
        for input in &inputs {
            std::fs::remove_file(input)?;
        }
    }
    reporter.success(&format!("Combined {} data file(s) into {}", inputs.len(), data_file.display()));
    Ok(())
}

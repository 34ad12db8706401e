//! Erase command handler

use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::ProgressReporter;

/// Execute the erase command
pub fn execute_erase(config: &CliConfig, reporter: &ProgressReporter) -> CliResult<()> {
    let data_file = config.data_file();
    if cubrir::store::erase(&data_file)? {
        reporter.success(&format!("Erased {}", data_file.display()));
    } else {
        reporter.info("No coverage data to erase");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use cubrir::CoverageStore;

    #[test]
    fn test_erase_data_and_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::new().with_root(dir.path());
        CoverageStore::new().save(&config.data_file()).unwrap();
        std::fs::create_dir_all(config.fragment_dir()).unwrap();

        let reporter = ProgressReporter::new(false, true);
        execute_erase(&config, &reporter).unwrap();
        assert!(!config.data_file().exists());
        assert!(!config.fragment_dir().exists());

        // Nothing left is not an error
        execute_erase(&config, &reporter).unwrap();
    }
}

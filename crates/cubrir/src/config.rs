//! Measurement and reporting configuration
//!
//! Loaded from `.cubrir.yaml` (or an explicit path) and layered under
//! command-line overrides. Every key is optional; missing keys keep their
//! defaults.

use crate::adapter::SessionScope;
use crate::result::{CubrirError, CubrirResult};
use crate::store::fragment_dir_for;
use crate::unit::DEFAULT_EXCLUDE_MARKER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = ".cubrir.yaml";

/// Default persisted store location
pub const DEFAULT_DATA_FILE: &str = ".cubrir/coverage.json";

/// Default HTML output directory
pub const DEFAULT_HTML_DIR: &str = "target/cubrir/html";

/// Largest accepted report precision
pub const MAX_PRECISION: usize = 6;

/// Coverage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageConfig {
    /// Source roots to discover units under
    pub source: Vec<PathBuf>,
    /// Glob patterns (matched against unit ids) to leave out
    pub omit: Vec<String>,
    /// Regular expression marking excluded lines
    pub exclude_marker: String,
    /// Persisted store path
    pub data_file: PathBuf,
    /// HTML report directory
    pub html_dir: PathBuf,
    /// HTML report title
    pub html_title: String,
    /// LCOV output path (stdout when unset)
    pub lcov_file: Option<PathBuf>,
    /// Decimal places in reported percentages
    pub precision: usize,
    /// Add the Missing column to the text report
    pub show_missing: bool,
    /// Hide fully covered units from the text report
    pub skip_covered: bool,
    /// Minimum global percentage
    pub fail_under: Option<f64>,
    /// Worker threads for in-process runs (0 = available parallelism)
    pub jobs: usize,
    /// Session granularity for in-process runs
    pub session_scope: SessionScope,
}

impl CoverageConfig {
    /// Create a builder for coverage config
    #[must_use]
    pub fn builder() -> CoverageConfigBuilder {
        CoverageConfigBuilder::default()
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> CubrirResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> CubrirResult<Self> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            CubrirError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml).map_err(|e| match e {
            CubrirError::Config { .. } => e,
            other => CubrirError::config(format!("{}: {other}", path.display())),
        })
    }

    /// Load `path` if given, else `.cubrir.yaml` under `dir` if present, else defaults
    pub fn discover(dir: &Path, path: Option<&Path>) -> CubrirResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let default_path = dir.join(DEFAULT_CONFIG_FILE);
        if default_path.is_file() {
            tracing::debug!(path = %default_path.display(), "loading configuration");
            return Self::load(&default_path);
        }
        Ok(Self::default())
    }

    /// Check value ranges
    pub fn validate(&self) -> CubrirResult<()> {
        if self.precision > MAX_PRECISION {
            return Err(CubrirError::config(format!(
                "precision must be at most {MAX_PRECISION}, got {}",
                self.precision
            )));
        }
        if let Some(threshold) = self.fail_under {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(CubrirError::config(format!(
                    "fail_under must be between 0 and 100, got {threshold}"
                )));
            }
        }
        if self.source.is_empty() {
            return Err(CubrirError::config("source must name at least one root"));
        }
        Ok(())
    }

    /// Worker count with `0` resolved to the machine's parallelism
    #[must_use]
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            self.jobs
        }
    }

    /// Directory that receives session fragments for external runs
    #[must_use]
    pub fn fragment_dir(&self) -> PathBuf {
        fragment_dir_for(&self.data_file)
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            source: vec![PathBuf::from("src")],
            omit: Vec::new(),
            exclude_marker: DEFAULT_EXCLUDE_MARKER.to_string(),
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            html_dir: PathBuf::from(DEFAULT_HTML_DIR),
            html_title: "Coverage report".to_string(),
            lcov_file: None,
            precision: 2,
            show_missing: false,
            skip_covered: false,
            fail_under: None,
            jobs: 0,
            session_scope: SessionScope::PerWorker,
        }
    }
}

/// Builder for coverage configuration
#[derive(Debug, Default)]
pub struct CoverageConfigBuilder {
    config: CoverageConfig,
    sources_set: bool,
}

impl CoverageConfigBuilder {
    /// Add a source root (the first call replaces the default `src`)
    #[must_use]
    pub fn source(mut self, root: impl Into<PathBuf>) -> Self {
        if !self.sources_set {
            self.config.source.clear();
            self.sources_set = true;
        }
        self.config.source.push(root.into());
        self
    }

    /// Add an omit glob pattern
    #[must_use]
    pub fn omit(mut self, pattern: impl Into<String>) -> Self {
        self.config.omit.push(pattern.into());
        self
    }

    /// Set the exclusion marker pattern
    #[must_use]
    pub fn exclude_marker(mut self, pattern: impl Into<String>) -> Self {
        self.config.exclude_marker = pattern.into();
        self
    }

    /// Set the persisted store path
    #[must_use]
    pub fn data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_file = path.into();
        self
    }

    /// Set the HTML output directory
    #[must_use]
    pub fn html_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.html_dir = path.into();
        self
    }

    /// Set the HTML report title
    #[must_use]
    pub fn html_title(mut self, title: impl Into<String>) -> Self {
        self.config.html_title = title.into();
        self
    }

    /// Set the LCOV output path
    #[must_use]
    pub fn lcov_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.lcov_file = Some(path.into());
        self
    }

    /// Set percentage precision
    #[must_use]
    pub fn precision(mut self, digits: usize) -> Self {
        self.config.precision = digits;
        self
    }

    /// Show missing line ranges
    #[must_use]
    pub fn show_missing(mut self, enabled: bool) -> Self {
        self.config.show_missing = enabled;
        self
    }

    /// Hide fully covered units
    #[must_use]
    pub fn skip_covered(mut self, enabled: bool) -> Self {
        self.config.skip_covered = enabled;
        self
    }

    /// Set the minimum global percentage
    #[must_use]
    pub fn fail_under(mut self, threshold: f64) -> Self {
        self.config.fail_under = Some(threshold);
        self
    }

    /// Set worker thread count
    #[must_use]
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.config.jobs = jobs;
        self
    }

    /// Set session granularity
    #[must_use]
    pub fn session_scope(mut self, scope: SessionScope) -> Self {
        self.config.session_scope = scope;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> CoverageConfig {
        self.config
    }
}

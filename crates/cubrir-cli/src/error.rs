//! Error types for the CLI

use cubrir::CubrirError;
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Process exit statuses
pub mod exit {
    /// Everything succeeded
    pub const SUCCESS: u8 = 0;
    /// The test command reported failures
    pub const TESTS_FAILED: u8 = 1;
    /// Command-line usage error (clap's own status)
    pub const USAGE: u8 = 2;
    /// Tests passed but a report could not be produced
    pub const REPORT_FAILED: u8 = 3;
    /// Configuration, I/O, or data errors
    pub const OTHER: u8 = 4;
    /// Total coverage below `--fail-under`
    pub const BELOW_THRESHOLD: u8 = 5;
}

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// The test command exited unsuccessfully
    #[error("Test command failed: {message}")]
    TestsFailed {
        /// Error message
        message: String,
    },

    /// The test command could not be started
    #[error("Could not start `{command}`: {source}")]
    Spawn {
        /// Command line
        command: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// No stored data to report on
    #[error("No coverage data at {path}; run `cubridor run` first")]
    NoData {
        /// Expected data file
        path: String,
    },

    /// Report generation error
    #[error("Report generation failed: {message}")]
    ReportGeneration {
        /// Error message
        message: String,
    },

    /// Coverage below the configured minimum
    #[error("Total coverage {actual}% is below the required {required}%")]
    BelowThreshold {
        /// Displayed total percentage
        actual: String,
        /// Required percentage
        required: f64,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cubrir library error
    #[error(transparent)]
    Cubrir(#[from] CubrirError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a test failure error
    #[must_use]
    pub fn tests_failed(message: impl Into<String>) -> Self {
        Self::TestsFailed {
            message: message.into(),
        }
    }

    /// Create a report generation error
    #[must_use]
    pub fn report_generation(message: impl Into<String>) -> Self {
        Self::ReportGeneration {
            message: message.into(),
        }
    }

    /// Exit status for this error
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::TestsFailed { .. } | Self::Cubrir(CubrirError::TestExecution { .. }) => exit::TESTS_FAILED,
            Self::ReportGeneration { .. } | Self::Cubrir(CubrirError::ReportRender { .. }) => exit::REPORT_FAILED,
            Self::BelowThreshold { .. } => exit::BELOW_THRESHOLD,
            Self::Config { .. }
            | Self::Spawn { .. }
            | Self::NoData { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Cubrir(_) => exit::OTHER,
        }
    }
}

//! Result and error types for Cubrir.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for Cubrir operations
pub type CubrirResult<T> = Result<T, CubrirError>;

/// Errors that can occur in Cubrir
#[derive(Debug, Error)]
pub enum CubrirError {
    /// Source unit could not be read or parsed for line identification
    #[error("Unreadable unit {unit}: {reason}")]
    UnreadableUnit {
        /// Unit identifier or path
        unit: String,
        /// Why the unit could not be read
        reason: String,
    },

    /// Tracer output could not be attributed to a known unit
    #[error("Instrumentation could not attach to {unit}: {reason}")]
    InstrumentationAttach {
        /// Raw unit path as reported by the probe
        unit: String,
        /// Why it could not be attached
        reason: String,
    },

    /// Test execution reported a failure
    #[error("Test execution failed in {test}: {message}")]
    TestExecution {
        /// Test (or command) name
        test: String,
        /// Failure message from the test framework
        message: String,
    },

    /// Report output could not be written or formatted
    #[error("Report rendering failed during {phase}: {message}")]
    ReportRender {
        /// Rendering phase (e.g. "html index")
        phase: String,
        /// Error message
        message: String,
    },

    /// Session handle is not active on this execution context
    #[error("Session {handle} is not active on this thread")]
    SessionNotActive {
        /// Raw session handle
        handle: u64,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Persisted data has an unsupported shape or version
    #[error("Unsupported coverage data in {path}: {message}")]
    DataFormat {
        /// Data file path
        path: String,
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl CubrirError {
    /// Create an unreadable unit error
    #[must_use]
    pub fn unreadable(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnreadableUnit {
            unit: unit.into(),
            reason: reason.into(),
        }
    }

    /// Create an instrumentation attach error
    #[must_use]
    pub fn attach(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InstrumentationAttach {
            unit: unit.into(),
            reason: reason.into(),
        }
    }

    /// Create a test execution error
    #[must_use]
    pub fn test_execution(test: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TestExecution {
            test: test.into(),
            message: message.into(),
        }
    }

    /// Create a report rendering error
    #[must_use]
    pub fn report_render(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReportRender {
            phase: phase.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Measurement-layer errors degrade to partial coverage instead of failing the run
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::UnreadableUnit { .. } | Self::InstrumentationAttach { .. }
        )
    }

    /// Convert a measurement-layer error into its recorded form
    #[must_use]
    pub fn to_recovered(&self) -> Option<RecoveredError> {
        match self {
            Self::UnreadableUnit { unit, reason } => Some(RecoveredError::new(
                RecoveredKind::UnreadableUnit,
                unit.clone(),
                reason.clone(),
            )),
            Self::InstrumentationAttach { unit, reason } => Some(RecoveredError::new(
                RecoveredKind::NotMeasured,
                unit.clone(),
                reason.clone(),
            )),
            _ => None,
        }
    }
}

/// Kind of a recovered measurement error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveredKind {
    /// Source could not be read or parsed
    UnreadableUnit,
    /// Probe output could not be attached to a unit
    NotMeasured,
    /// Session fragment could not be loaded
    BadFragment,
}

impl fmt::Display for RecoveredKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UnreadableUnit => "unreadable",
            Self::NotMeasured => "not measured",
            Self::BadFragment => "bad fragment",
        };
        f.write_str(label)
    }
}

/// A measurement error that was recovered from and must still be reported
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecoveredError {
    /// Error kind
    pub kind: RecoveredKind,
    /// Unit identifier, raw probe path, or fragment path
    pub subject: String,
    /// Human-readable reason
    pub reason: String,
}

impl RecoveredError {
    /// Create a recovered error record
    #[must_use]
    pub fn new(kind: RecoveredKind, subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RecoveredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.subject, self.kind, self.reason)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_error_message() {
        let err = CubrirError::unreadable("src/lib.rs", "expected `;`");
        assert!(err.to_string().contains("Unreadable unit src/lib.rs"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_attach_error_is_recoverable() {
        let err = CubrirError::attach("gen/out.rs", "unknown unit");
        assert!(err.is_recoverable());
        let recovered = err.to_recovered().unwrap();
        assert_eq!(recovered.kind, RecoveredKind::NotMeasured);
        assert_eq!(recovered.subject, "gen/out.rs");
    }

    #[test]
    fn test_execution_and_render_errors_are_not_recoverable() {
        assert!(!CubrirError::test_execution("cargo test", "exit status 101").is_recoverable());
        assert!(!CubrirError::report_render("html index", "disk full").is_recoverable());
        assert!(CubrirError::report_render("html", "x").to_recovered().is_none());
    }

    #[test]
    fn test_report_render_mentions_phase() {
        let err = CubrirError::report_render("html index", "permission denied");
        assert!(err.to_string().contains("html index"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CubrirError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }

    #[test]
    fn test_recovered_error_display() {
        let err = RecoveredError::new(RecoveredKind::UnreadableUnit, "src/bad.rs", "parse error");
        assert_eq!(err.to_string(), "src/bad.rs (unreadable): parse error");
    }

    #[test]
    fn test_recovered_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&RecoveredKind::NotMeasured).unwrap();
        assert_eq!(json, "\"not-measured\"");
    }
}

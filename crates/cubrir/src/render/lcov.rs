//! LCOV tracefile export
//!
//! ```text
//! TN:<test name>
//! SF:<source file>
//! DA:<line>,<0|1>
//! LF:<lines found>
//! LH:<lines hit>
//! end_of_record
//! ```
//!
//! Hits are binary, so every `DA` count is 0 or 1.

use crate::report::AggregateReport;
use crate::result::{CubrirError, CubrirResult};
use std::fmt::Write;
use std::path::Path;

/// LCOV format report generator
#[derive(Debug)]
pub struct LcovFormatter<'a> {
    report: &'a AggregateReport,
    test_name: Option<String>,
}

impl<'a> LcovFormatter<'a> {
    /// Create a new LCOV formatter
    #[must_use]
    pub fn new(report: &'a AggregateReport) -> Self {
        Self {
            report,
            test_name: None,
        }
    }

    /// Set the test name for the report
    #[must_use]
    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }

    /// Generate the tracefile
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "TN:{}", self.test_name.as_deref().unwrap_or(""));

        for unit in self.report.units().iter().filter(|u| u.is_measured()) {
            let _ = writeln!(output, "SF:{}", unit.id);
            for line in &unit.executable {
                let count = u8::from(unit.hit.contains(line));
                let _ = writeln!(output, "DA:{line},{count}");
            }
            let _ = writeln!(output, "LF:{}", unit.statements());
            let _ = writeln!(output, "LH:{}", unit.hit.len());
            output.push_str("end_of_record\n");
        }

        output
    }

    /// Save the tracefile
    pub fn save(&self, path: &Path) -> CubrirResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CubrirError::report_render("lcov", e.to_string()))?;
        }
        std::fs::write(path, self.generate())
            .map_err(|e| CubrirError::report_render("lcov", format!("{}: {e}", path.display())))
    }
}

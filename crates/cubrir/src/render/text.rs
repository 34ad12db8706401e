//! Textual summary report
//!
//! ```text
//! Name          Stmts   Miss    Cover   Missing
//! ---------------------------------------------
//! src/a.rs          5      2   60.00%   3, 5
//! src/b.rs          3      0  100.00%
//! ---------------------------------------------
//! TOTAL             8      2   75.00%
//! ```

use crate::report::{AggregateReport, UnitCoverage, UnitStatus};
use std::fmt::Write;

/// Text report options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextOptions {
    /// Decimal places in percentages
    pub precision: usize,
    /// Add the Missing column
    pub show_missing: bool,
    /// Hide fully covered rows
    pub skip_covered: bool,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            precision: 2,
            show_missing: false,
            skip_covered: false,
        }
    }
}

/// Renders an [`AggregateReport`] as a fixed-width table
#[derive(Debug)]
pub struct TextFormatter<'a> {
    report: &'a AggregateReport,
    options: TextOptions,
}

struct Row {
    name: String,
    stmts: String,
    miss: String,
    cover: String,
    missing: String,
}

impl<'a> TextFormatter<'a> {
    /// Create a formatter with default options
    #[must_use]
    pub fn new(report: &'a AggregateReport) -> Self {
        Self {
            report,
            options: TextOptions::default(),
        }
    }

    /// Set the report options
    #[must_use]
    pub fn with_options(mut self, options: TextOptions) -> Self {
        self.options = options;
        self
    }

    fn row(&self, unit: &UnitCoverage) -> Row {
        let precision = self.options.precision;
        let flag = match unit.status {
            UnitStatus::Measured => None,
            UnitStatus::Unreadable { .. } => Some("(unreadable)"),
            UnitStatus::NotMeasured { .. } => Some("(not measured)"),
        };
        if let Some(flag) = flag {
            return Row {
                name: unit.id.to_string(),
                stmts: "-".to_string(),
                miss: "-".to_string(),
                cover: format!("{}%", unit.percent_text(precision)),
                missing: flag.to_string(),
            };
        }
        Row {
            name: unit.id.to_string(),
            stmts: unit.statements().to_string(),
            miss: unit.missed().to_string(),
            cover: format!("{}%", unit.percent_text(precision)),
            missing: unit.missing_text(),
        }
    }

    /// Render the report
    #[must_use]
    pub fn generate(&self) -> String {
        if self.report.units().is_empty() {
            return "No data to report.\n".to_string();
        }

        let mut skipped = 0usize;
        let mut rows = Vec::new();
        for unit in self.report.units() {
            if self.options.skip_covered && unit.is_fully_covered() {
                skipped += 1;
                continue;
            }
            rows.push(self.row(unit));
        }

        let totals = self.report.totals();
        let total = Row {
            name: "TOTAL".to_string(),
            stmts: totals.statements.to_string(),
            miss: totals.missed.to_string(),
            cover: format!("{}%", totals.ratio().format(self.options.precision)),
            missing: String::new(),
        };

        let name_w = rows
            .iter()
            .chain(std::iter::once(&total))
            .map(|r| r.name.len())
            .max()
            .unwrap_or(0)
            .max("Name".len());
        let num_w = rows
            .iter()
            .chain(std::iter::once(&total))
            .flat_map(|r| [r.stmts.len(), r.miss.len()])
            .max()
            .unwrap_or(0)
            .max("Stmts".len());
        let cover_w = rows
            .iter()
            .chain(std::iter::once(&total))
            .map(|r| r.cover.len())
            .max()
            .unwrap_or(0)
            .max("Cover".len());

        let mut out = String::new();
        let mut header = format!(
            "{:<name_w$}   {:>num_w$}   {:>num_w$}   {:>cover_w$}",
            "Name", "Stmts", "Miss", "Cover"
        );
        if self.options.show_missing {
            header.push_str("   Missing");
        }
        let rule = "-".repeat(header.len());
        let _ = writeln!(out, "{header}");
        let _ = writeln!(out, "{rule}");

        for row in rows.iter().chain(std::iter::once(&total)) {
            if std::ptr::eq(row, &total) {
                let _ = writeln!(out, "{rule}");
            }
            let mut line = format!(
                "{:<name_w$}   {:>num_w$}   {:>num_w$}   {:>cover_w$}",
                row.name, row.stmts, row.miss, row.cover
            );
            if self.options.show_missing && !row.missing.is_empty() {
                line.push_str("   ");
                line.push_str(&row.missing);
            }
            let _ = writeln!(out, "{}", line.trim_end());
        }

        if skipped > 0 {
            let noun = if skipped == 1 { "unit" } else { "units" };
            let _ = writeln!(out, "\n{skipped} {noun} skipped due to complete coverage.");
        }

        if self.report.has_recovered() {
            let details: Vec<String> = self
                .report
                .recovered()
                .iter()
                .map(ToString::to_string)
                .collect();
            let _ = writeln!(
                out,
                "\n{} measurement error(s) recovered: {}",
                details.len(),
                details.join("; ")
            );
        }

        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::CoverageStore;
    use crate::unit::{LineAnalysis, Unit, UnitId, UnitRegistry};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn report(units: &[(&str, &[u32], &[u32])], unreadable: &[&str]) -> AggregateReport {
        let mut registry = UnitRegistry::new("/w");
        let mut store = CoverageStore::new();
        for (id, executable, hit) in units {
            registry.insert(Unit::new(
                UnitId::new(*id),
                PathBuf::from(id),
                LineAnalysis {
                    executable: executable.iter().copied().collect(),
                    excluded: Default::default(),
                    instrumented: true,
                },
                Arc::from(""),
            ));
            store.insert_lines(UnitId::new(*id), hit.iter().copied());
        }
        for id in unreadable {
            registry.insert_unreadable(UnitId::new(*id), "expected item");
        }
        AggregateReport::snapshot(&store, &registry)
    }

    #[test]
    fn test_basic_table() {
        let report = report(&[("src/a.rs", &[1, 2, 3, 4, 5], &[1, 2, 4]), ("src/b.rs", &[1, 2, 3], &[1, 2, 3])], &[]);
        let text = TextFormatter::new(&report).generate();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Name       Stmts    Miss     Cover");
        assert!(lines[1].chars().all(|c| c == '-'));
        assert_eq!(lines[2], "src/a.rs       5       2    60.00%");
        assert_eq!(lines[3], "src/b.rs       3       0   100.00%");
        assert!(lines[4].starts_with('-'));
        assert_eq!(lines[5], "TOTAL          8       2    75.00%");
    }

    #[test]
    fn test_missing_column() {
        let report = report(&[("src/a.rs", &[1, 2, 3, 4, 5], &[1, 2, 4])], &[]);
        let options = TextOptions {
            show_missing: true,
            precision: 1,
            ..TextOptions::default()
        };
        let text = TextFormatter::new(&report).with_options(options).generate();
        assert!(text.lines().next().unwrap().ends_with("Missing"));
        let row = text.lines().find(|l| l.starts_with("src/a.rs")).unwrap();
        assert!(row.ends_with("60.0%   3, 5"));
    }

    #[test]
    fn test_skip_covered() {
        let report = report(&[("src/a.rs", &[1, 2], &[1]), ("src/b.rs", &[1], &[1])], &[]);
        let options = TextOptions {
            skip_covered: true,
            ..TextOptions::default()
        };
        let text = TextFormatter::new(&report).with_options(options).generate();
        assert!(!text.contains("src/b.rs"));
        assert!(text.contains("1 unit skipped due to complete coverage."));
    }

    #[test]
    fn test_unreadable_row_and_recovered_summary() {
        let report = report(&[("src/a.rs", &[1], &[1])], &["src/bad.rs"]);
        let options = TextOptions {
            show_missing: true,
            ..TextOptions::default()
        };
        let text = TextFormatter::new(&report).with_options(options).generate();
        let row = text.lines().find(|l| l.starts_with("src/bad.rs")).unwrap();
        assert!(row.contains("0.00%"));
        assert!(row.contains("(unreadable)"));
        assert!(text.contains("1 measurement error(s) recovered: src/bad.rs (unreadable): expected item"));
        let total = text.lines().find(|l| l.starts_with("TOTAL")).unwrap();
        assert!(total.ends_with("100.00%"));
    }

    #[test]
    fn test_not_measured_row_outside_totals() {
        let mut registry = UnitRegistry::new("/w");
        for (id, instrumented) in [("src/a.rs", true), ("src/plain.rs", false)] {
            registry.insert(Unit::new(
                UnitId::new(id),
                PathBuf::from(id),
                LineAnalysis {
                    executable: [1, 2].into_iter().collect(),
                    excluded: Default::default(),
                    instrumented,
                },
                Arc::from(""),
            ));
        }
        let mut store = CoverageStore::new();
        store.insert_lines(UnitId::new("src/a.rs"), [1, 2]);
        let report = AggregateReport::snapshot(&store, &registry);

        let options = TextOptions {
            show_missing: true,
            ..TextOptions::default()
        };
        let text = TextFormatter::new(&report).with_options(options).generate();
        let row = text.lines().find(|l| l.starts_with("src/plain.rs")).unwrap();
        assert!(row.contains("0.00%"));
        assert!(row.ends_with("(not measured)"));
        let total = text.lines().find(|l| l.starts_with("TOTAL")).unwrap();
        assert!(total.ends_with("100.00%"));
        assert!(text.contains("1 measurement error(s) recovered: src/plain.rs (not measured)"));
    }

    #[test]
    fn test_no_units() {
        let report = report(&[], &[]);
        assert_eq!(TextFormatter::new(&report).generate(), "No data to report.\n");
    }
}

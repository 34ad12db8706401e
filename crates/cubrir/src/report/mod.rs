//! Aggregate coverage report
//!
//! A read-only snapshot of a [`CoverageStore`] against a [`UnitRegistry`].
//! Renderers take an [`AggregateReport`] and nothing else.

mod percent;
mod ranges;

pub use percent::Ratio;
pub use ranges::{format_ranges, missing_ranges};

use crate::result::{RecoveredError, RecoveredKind};
use crate::store::CoverageStore;
use crate::unit::{LineSet, UnitId, UnitRegistry};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Measurement status of a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum UnitStatus {
    /// Identified and measured
    Measured,
    /// Could not be read or parsed; shown at 0% and left out of totals
    Unreadable {
        /// Why identification failed
        reason: String,
    },
    /// Never instrumented, so no probe could report; shown at 0% and left
    /// out of totals
    NotMeasured {
        /// Why no hits could be collected
        reason: String,
    },
}

/// Reason attached to units without any instrumented item
pub const NOT_INSTRUMENTED: &str = "no item carries #[cubrir::instrument]";

/// Classification of one source line in a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// Executable and hit
    Run,
    /// Executable and never hit
    Missing,
    /// Removed by the exclusion directive
    Excluded,
    /// Not executable
    Plain,
}

/// Per-unit coverage figures
#[derive(Debug, Clone, Serialize)]
pub struct UnitCoverage {
    /// Unit identifier
    pub id: UnitId,
    /// Executable lines
    pub executable: LineSet,
    /// Hit lines (subset of executable)
    pub hit: LineSet,
    /// Executable lines never hit
    pub missing: LineSet,
    /// Lines removed by the exclusion directive
    pub excluded: LineSet,
    /// Measurement status
    #[serde(flatten)]
    pub status: UnitStatus,
    /// Source text, when readable
    #[serde(skip)]
    pub source: Option<Arc<str>>,
}

impl UnitCoverage {
    /// Statement (executable line) count
    #[must_use]
    pub fn statements(&self) -> usize {
        self.executable.len()
    }

    /// Missed statement count
    #[must_use]
    pub fn missed(&self) -> usize {
        self.missing.len()
    }

    /// Covered / executable ratio
    #[must_use]
    pub fn ratio(&self) -> Ratio {
        Ratio::new(self.hit.len(), self.executable.len())
    }

    /// Percentage text at `precision`, `0` for units that were not measured
    #[must_use]
    pub fn percent_text(&self, precision: usize) -> String {
        if !self.is_measured() {
            return Ratio::new(0, 1).format(precision);
        }
        self.ratio().format(precision)
    }

    /// Whether the unit was identified and could record hits
    #[must_use]
    pub fn is_measured(&self) -> bool {
        matches!(self.status, UnitStatus::Measured)
    }

    /// Whether identification failed for this unit
    #[must_use]
    pub fn is_unreadable(&self) -> bool {
        matches!(self.status, UnitStatus::Unreadable { .. })
    }

    /// Whether every executable line was hit
    #[must_use]
    pub fn is_fully_covered(&self) -> bool {
        self.is_measured() && self.missing.is_empty()
    }

    /// Missing lines grouped into ranges
    #[must_use]
    pub fn missing_ranges(&self) -> Vec<(u32, u32)> {
        missing_ranges(&self.missing, &self.executable)
    }

    /// Missing ranges as display text (`12-15, 42`)
    #[must_use]
    pub fn missing_text(&self) -> String {
        format_ranges(&self.missing_ranges())
    }

    /// Classify a 1-based source line
    #[must_use]
    pub fn line_state(&self, line: u32) -> LineState {
        if self.excluded.contains(&line) {
            LineState::Excluded
        } else if self.hit.contains(&line) {
            LineState::Run
        } else if self.missing.contains(&line) {
            LineState::Missing
        } else {
            LineState::Plain
        }
    }
}

/// Global totals over measured units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// Σ executable lines
    pub statements: usize,
    /// Σ missed lines
    pub missed: usize,
}

impl Totals {
    /// Size-weighted ratio: Σhit / Σexecutable
    #[must_use]
    pub fn ratio(&self) -> Ratio {
        Ratio::new(self.statements - self.missed, self.statements)
    }
}

/// Snapshot of coverage over every known unit
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    units: Vec<UnitCoverage>,
    totals: Totals,
    recovered: Vec<RecoveredError>,
}

impl AggregateReport {
    /// Compute the report for `store` over the units in `registry`
    ///
    /// Every registry unit appears, hit or not. Unreadable units, and units
    /// with executable lines but neither an instrumented item nor a recorded
    /// hit, appear at 0% flagged as not measured and do not contribute to the
    /// totals.
    #[must_use]
    pub fn snapshot(store: &CoverageStore, registry: &UnitRegistry) -> Self {
        let mut units = Vec::with_capacity(registry.len());
        let mut totals = Totals::default();
        let mut not_measured = Vec::new();

        for unit in registry.units() {
            let empty = LineSet::new();
            let hits = store.hits(unit.id()).unwrap_or(&empty);
            let hit: LineSet = hits.intersection(unit.executable()).copied().collect();

            if !unit.is_instrumented() && hit.is_empty() && !unit.executable().is_empty() {
                not_measured.push(RecoveredError::new(
                    RecoveredKind::NotMeasured,
                    unit.id().as_str(),
                    NOT_INSTRUMENTED,
                ));
                units.push(UnitCoverage {
                    id: unit.id().clone(),
                    executable: unit.executable().clone(),
                    hit,
                    missing: LineSet::new(),
                    excluded: unit.excluded().clone(),
                    status: UnitStatus::NotMeasured {
                        reason: NOT_INSTRUMENTED.to_string(),
                    },
                    source: Some(Arc::clone(unit.source())),
                });
                continue;
            }

            let missing: LineSet = unit.executable().difference(&hit).copied().collect();
            totals.statements += unit.executable().len();
            totals.missed += missing.len();

            units.push(UnitCoverage {
                id: unit.id().clone(),
                executable: unit.executable().clone(),
                hit,
                missing,
                excluded: unit.excluded().clone(),
                status: UnitStatus::Measured,
                source: Some(Arc::clone(unit.source())),
            });
        }

        for (id, reason) in registry.unreadable() {
            units.push(UnitCoverage {
                id: id.clone(),
                executable: LineSet::new(),
                hit: LineSet::new(),
                missing: LineSet::new(),
                excluded: LineSet::new(),
                status: UnitStatus::Unreadable {
                    reason: reason.to_string(),
                },
                source: None,
            });
        }
        units.sort_by(|a, b| a.id.cmp(&b.id));

        let recovered: BTreeSet<RecoveredError> = store
            .recovered()
            .cloned()
            .chain(registry.recovered_errors())
            .chain(not_measured)
            .collect();

        Self {
            units,
            totals,
            recovered: recovered.into_iter().collect(),
        }
    }

    /// Per-unit figures in identifier order
    #[must_use]
    pub fn units(&self) -> &[UnitCoverage] {
        &self.units
    }

    /// Look up one unit
    #[must_use]
    pub fn unit(&self, id: &UnitId) -> Option<&UnitCoverage> {
        self.units.iter().find(|u| &u.id == id)
    }

    /// Global totals
    #[must_use]
    pub fn totals(&self) -> Totals {
        self.totals
    }

    /// Recovered measurement errors
    #[must_use]
    pub fn recovered(&self) -> &[RecoveredError] {
        &self.recovered
    }

    /// Whether any recovered error was recorded
    #[must_use]
    pub fn has_recovered(&self) -> bool {
        !self.recovered.is_empty()
    }
}

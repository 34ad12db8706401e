//! Coverage Store
//!
//! Unit → hit lines, accumulated across sessions. Recording only keeps lines
//! the unit declares executable, so `hit ⊆ executable` holds for every unit
//! in every store built through [`CoverageStore::record`].

mod fragments;
mod persist;

pub use fragments::{fragment_dir_for, read_fragments, write_fragment, FRAGMENT_PREFIX};
pub use persist::{erase, STORE_FORMAT};

use crate::result::{RecoveredError, RecoveredKind};
use crate::tracer::Session;
use crate::unit::{LineSet, UnitId, UnitRegistry};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, PoisonError};

/// Hit lines per unit plus recovered measurement errors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageStore {
    units: BTreeMap<UnitId, LineSet>,
    recovered: BTreeSet<RecoveredError>,
}

impl CoverageStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a finished session into the store
    ///
    /// Hits on lines outside a unit's executable set are dropped. Hits naming
    /// a path the registry cannot resolve mark that path as not measured.
    pub fn record(&mut self, session: &Session, registry: &UnitRegistry) {
        for (raw, lines) in &session.hits {
            let Some(id) = registry.resolve(raw) else {
                tracing::warn!(unit = %raw, session = %session.id, "hits for unknown unit");
                let _ = self.recovered.insert(RecoveredError::new(
                    RecoveredKind::NotMeasured,
                    raw.clone(),
                    "probe path does not match any discovered unit",
                ));
                continue;
            };
            let Some(unit) = registry.get(id) else {
                // Resolved to an unreadable unit; nothing is executable there
                continue;
            };
            let hit = self.units.entry(id.clone()).or_default();
            hit.extend(lines.iter().copied().filter(|line| unit.is_executable(*line)));
        }
        tracing::debug!(session = %session.id, scope = %session.scope, "session recorded");
    }

    /// Union `other` into this store
    pub fn merge_from(&mut self, other: &Self) {
        for (id, lines) in &other.units {
            self.units
                .entry(id.clone())
                .or_default()
                .extend(lines.iter().copied());
        }
        self.recovered.extend(other.recovered.iter().cloned());
    }

    /// Record a recovered measurement error
    pub fn add_recovered(&mut self, error: RecoveredError) {
        let _ = self.recovered.insert(error);
    }

    /// Add hit lines for a unit directly (loading, combining)
    pub fn insert_lines(&mut self, id: UnitId, lines: impl IntoIterator<Item = u32>) {
        self.units.entry(id).or_default().extend(lines);
    }

    /// Hit lines of a unit
    #[must_use]
    pub fn hits(&self, id: &UnitId) -> Option<&LineSet> {
        self.units.get(id)
    }

    /// Units with recorded hits, in identifier order
    pub fn units(&self) -> impl Iterator<Item = (&UnitId, &LineSet)> {
        self.units.iter()
    }

    /// Recovered errors, ordered
    pub fn recovered(&self) -> impl Iterator<Item = &RecoveredError> {
        self.recovered.iter()
    }

    /// Total distinct (unit, line) hits
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.units.values().map(BTreeSet::len).sum()
    }

    /// Whether the store holds neither hits nor recovered errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.values().all(BTreeSet::is_empty) && self.recovered.is_empty()
    }

    /// Drop hits that are not executable in `registry` (after re-discovery)
    pub fn restrict_to(&mut self, registry: &UnitRegistry) {
        for (id, lines) in &mut self.units {
            match registry.get(id) {
                Some(unit) => lines.retain(|line| unit.is_executable(*line)),
                None => lines.clear(),
            }
        }
        self.units.retain(|_, lines| !lines.is_empty());
    }
}

/// Merge two stores into a new one
///
/// Per-unit union; units present in only one input pass through unchanged.
/// Commutative and associative.
#[must_use]
pub fn merge(a: &CoverageStore, b: &CoverageStore) -> CoverageStore {
    let mut merged = a.clone();
    merged.merge_from(b);
    merged
}

/// Store shared by concurrent collectors
///
/// Each [`record`](Self::record) is one critical section regardless of how
/// many hits the session carries.
#[derive(Debug, Default)]
pub struct SharedStore {
    inner: Mutex<CoverageStore>,
}

impl SharedStore {
    /// Wrap an existing store
    #[must_use]
    pub fn new(store: CoverageStore) -> Self {
        Self {
            inner: Mutex::new(store),
        }
    }

    /// Merge a session under the lock
    pub fn record(&self, session: &Session, registry: &UnitRegistry) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(session, registry);
    }

    /// Merge a whole store under the lock
    pub fn merge_from(&self, other: &CoverageStore) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .merge_from(other);
    }

    /// Copy of the current contents
    #[must_use]
    pub fn snapshot(&self) -> CoverageStore {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Take the store out
    #[must_use]
    pub fn into_inner(self) -> CoverageStore {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

//! Session: hits recorded during one tracer activation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Opaque handle naming an active session on one thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub(crate) u64);

impl SessionHandle {
    /// Raw handle value
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One execution window and the (raw unit path, line) pairs hit during it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session id (UUID v4)
    pub id: String,
    /// Scope name (test name, worker name, `ambient`)
    pub scope: String,
    /// Activation time
    pub started_at: DateTime<Utc>,
    /// Deactivation time
    pub finished_at: Option<DateTime<Utc>>,
    /// Hit lines per raw unit path
    pub hits: BTreeMap<String, BTreeSet<u32>>,
}

impl Session {
    /// Start a new, empty session
    #[must_use]
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scope: scope.into(),
            started_at: Utc::now(),
            finished_at: None,
            hits: BTreeMap::new(),
        }
    }

    /// Record a hit; returns `true` when the pair was new
    pub fn record(&mut self, unit: &str, line: u32) -> bool {
        match self.hits.get_mut(unit) {
            Some(lines) => lines.insert(line),
            None => {
                let _ = self.hits.insert(unit.to_string(), BTreeSet::from([line]));
                true
            }
        }
    }

    /// Union another session's hits into this one
    pub fn absorb(&mut self, other: &Self) {
        for (unit, lines) in &other.hits {
            self.hits
                .entry(unit.clone())
                .or_default()
                .extend(lines.iter().copied());
        }
    }

    /// Mark the session finished now
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Lines hit in `unit`
    #[must_use]
    pub fn lines(&self, unit: &str) -> Option<&BTreeSet<u32>> {
        self.hits.get(unit)
    }

    /// Distinct (unit, line) pairs
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hits.values().map(BTreeSet::len).sum()
    }

    /// Whether nothing was hit
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.values().all(BTreeSet::is_empty)
    }
}

//! Unit discovery and probe-path resolution

use super::{normalize_separators, Unit, UnitId, UnitIdentifier};
use crate::config::CoverageConfig;
use crate::result::{CubrirError, CubrirResult, RecoveredError, RecoveredKind};
use glob::Pattern;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// All units known to a measurement run, keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    root: PathBuf,
    units: BTreeMap<UnitId, Unit>,
    unreadable: BTreeMap<UnitId, String>,
}

impl UnitRegistry {
    /// Create an empty registry rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            units: BTreeMap::new(),
            unreadable: BTreeMap::new(),
        }
    }

    /// Walk the configured source roots and identify every `.rs` file
    ///
    /// Files that fail to read or parse are kept as unreadable units rather
    /// than aborting discovery.
    pub fn discover(root: &Path, config: &CoverageConfig) -> CubrirResult<Self> {
        let identifier = UnitIdentifier::new(&config.exclude_marker)?;
        let omit = config
            .omit
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| CubrirError::config(format!("invalid omit pattern `{p}`: {e}")))
            })
            .collect::<CubrirResult<Vec<_>>>()?;

        let mut files = Vec::new();
        for source in &config.source {
            let start = if source.is_absolute() {
                source.clone()
            } else {
                root.join(source)
            };
            if start.is_file() {
                files.push(start);
            } else if start.is_dir() {
                collect_rust_files(&start, &mut files)?;
            } else {
                tracing::warn!(source = %start.display(), "source root does not exist");
            }
        }

        let mut registry = Self::new(root);
        for path in files {
            let id = UnitId::from_path(root, &path);
            if omit.iter().any(|p| p.matches(id.as_str())) {
                tracing::debug!(unit = %id, "omitted");
                continue;
            }
            match identifier.identify_file(root, &path) {
                Ok(unit) => registry.insert(unit),
                Err(CubrirError::UnreadableUnit { reason, .. }) => {
                    tracing::warn!(unit = %id, %reason, "unit could not be identified");
                    registry.insert_unreadable(id, reason);
                }
                Err(other) => return Err(other),
            }
        }

        tracing::info!(
            units = registry.units.len(),
            unreadable = registry.unreadable.len(),
            "discovered units"
        );
        Ok(registry)
    }

    /// Root directory unit identifiers are relative to
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register an identified unit
    pub fn insert(&mut self, unit: Unit) {
        let _ = self.unreadable.remove(unit.id());
        let _ = self.units.insert(unit.id().clone(), unit);
    }

    /// Register a unit that could not be identified
    pub fn insert_unreadable(&mut self, id: UnitId, reason: impl Into<String>) {
        let _ = self.units.remove(&id);
        let _ = self.unreadable.insert(id, reason.into());
    }

    /// Look up a unit by identifier
    #[must_use]
    pub fn get(&self, id: &UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Identified units in identifier order
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Unreadable units with their reasons, in identifier order
    pub fn unreadable(&self) -> impl Iterator<Item = (&UnitId, &str)> {
        self.unreadable.iter().map(|(id, reason)| (id, reason.as_str()))
    }

    /// Number of identified units
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether no units (readable or not) are known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.unreadable.is_empty()
    }

    /// Recovered errors for every unreadable unit
    #[must_use]
    pub fn recovered_errors(&self) -> Vec<RecoveredError> {
        self.unreadable
            .iter()
            .map(|(id, reason)| RecoveredError::new(RecoveredKind::UnreadableUnit, id.as_str(), reason))
            .collect()
    }

    /// Map a raw probe path (as produced by `file!()`) to a known unit
    ///
    /// Tries, in order: exact match, match after stripping the registry root,
    /// then a unique path-component suffix match in either direction. The last
    /// step covers workspace builds where `file!()` is relative to the
    /// workspace while units are relative to a member crate.
    #[must_use]
    pub fn resolve(&self, raw: &str) -> Option<&UnitId> {
        let normalized = normalize_separators(raw);
        let candidate = if Path::new(&normalized).is_absolute() {
            UnitId::from_path(&self.root, Path::new(&normalized))
        } else {
            UnitId::new(normalized)
        };
        if let Some((id, _)) = self.units.get_key_value(&candidate) {
            return Some(id);
        }
        if let Some((id, _)) = self.unreadable.get_key_value(&candidate) {
            return Some(id);
        }

        let raw_str = candidate.as_str();
        let mut matches = self
            .units
            .keys()
            .chain(self.unreadable.keys())
            .filter(|id| is_component_suffix(raw_str, id.as_str()) || is_component_suffix(id.as_str(), raw_str));
        let first = matches.next()?;
        if matches.next().is_some() {
            tracing::debug!(raw, "ambiguous probe path");
            return None;
        }
        Some(first)
    }
}

/// Whether `suffix` equals `path` or ends it at a `/` boundary
fn is_component_suffix(path: &str, suffix: &str) -> bool {
    path.len() > suffix.len()
        && path.ends_with(suffix)
        && path.as_bytes()[path.len() - suffix.len() - 1] == b'/'
}

fn collect_rust_files(dir: &Path, out: &mut Vec<PathBuf>) -> CubrirResult<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(std::fs::DirEntry::file_name);
    for entry in entries {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if path.is_dir() {
            if name.starts_with('.') || name == "target" {
                continue;
            }
            collect_rust_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
    Ok(())
}

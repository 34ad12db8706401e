//! Units under measurement
//!
//! A unit is one Rust source file. Its identity is the root-relative path with
//! `/` separators, so the same file maps to the same [`UnitId`] on every
//! platform and in every process that measures it.

mod identifier;
mod registry;

pub use identifier::{LineAnalysis, UnitIdentifier, DEFAULT_EXCLUDE_MARKER};
pub use registry::UnitRegistry;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Ordered set of 1-based line numbers
pub type LineSet = BTreeSet<u32>;

/// Stable identifier of a unit (root-relative, `/`-separated path)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Create an identifier from an already-canonical string
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(normalize_separators(&id.into()))
    }

    /// Derive the identifier of `path` relative to `root`
    ///
    /// Paths outside `root` keep their normalized form.
    #[must_use]
    pub fn from_path(root: &Path, path: &Path) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                Component::ParentDir => Some("..".to_string()),
                Component::RootDir | Component::Prefix(_) | Component::CurDir => None,
            })
            .collect();
        if relative.is_absolute() {
            Self(format!("/{}", parts.join("/")))
        } else {
            Self(parts.join("/"))
        }
    }

    /// Get the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a raw path string as produced by `file!()` or the filesystem
#[must_use]
pub fn normalize_separators(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let mut trimmed = unified.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

/// A source file with its executable and excluded line sets
#[derive(Debug, Clone)]
pub struct Unit {
    id: UnitId,
    path: PathBuf,
    executable: LineSet,
    excluded: LineSet,
    instrumented: bool,
    source: Arc<str>,
}

impl Unit {
    /// Create a unit from its analysis
    #[must_use]
    pub fn new(id: UnitId, path: PathBuf, analysis: LineAnalysis, source: Arc<str>) -> Self {
        Self {
            id,
            path,
            executable: analysis.executable,
            excluded: analysis.excluded,
            instrumented: analysis.instrumented,
            source,
        }
    }

    /// Unit identifier
    #[must_use]
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    /// Filesystem path the unit was read from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines that can record a hit
    #[must_use]
    pub fn executable(&self) -> &LineSet {
        &self.executable
    }

    /// Lines removed by the exclusion directive
    #[must_use]
    pub fn excluded(&self) -> &LineSet {
        &self.excluded
    }

    /// Whether the source carries `#[cubrir::instrument]` anywhere
    #[must_use]
    pub fn is_instrumented(&self) -> bool {
        self.instrumented
    }

    /// Full source text
    #[must_use]
    pub fn source(&self) -> &Arc<str> {
        &self.source
    }

    /// Whether `line` can record a hit
    #[must_use]
    pub fn is_executable(&self, line: u32) -> bool {
        self.executable.contains(&line)
    }
}

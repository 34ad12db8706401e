//! Session fragments exchanged between processes
//!
//! An instrumented process writes each finished ambient session to its own
//! file, so concurrent writers never share a file and need no locking.

use super::CoverageStore;
use crate::result::{CubrirResult, RecoveredError, RecoveredKind};
use crate::tracer::Session;
use crate::unit::UnitRegistry;
use std::path::{Path, PathBuf};

/// File name prefix of session fragments
pub const FRAGMENT_PREFIX: &str = "session-";

/// Fragment directory that belongs to a data file (`<data_file>.d`)
#[must_use]
pub fn fragment_dir_for(data_file: &Path) -> PathBuf {
    let mut name = data_file.as_os_str().to_os_string();
    name.push(".d");
    PathBuf::from(name)
}

/// Write `session` to `<dir>/session-<id>.json`
pub fn write_fragment(dir: &Path, session: &Session) -> CubrirResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{FRAGMENT_PREFIX}{}.json", session.id));
    let json = serde_json::to_vec(session)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// Read every fragment in `dir`, in file-name order
///
/// Fragments that cannot be read or decoded are returned as recovered errors
/// instead of failing the whole read. A missing directory yields nothing.
pub fn read_fragments(dir: &Path) -> CubrirResult<(Vec<Session>, Vec<RecoveredError>)> {
    let mut sessions = Vec::new();
    let mut recovered = Vec::new();
    if !dir.is_dir() {
        return Ok((sessions, recovered));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(FRAGMENT_PREFIX) && n.ends_with(".json"))
        })
        .collect();
    paths.sort();

    for path in paths {
        let parsed = std::fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice::<Session>(&bytes).map_err(|e| e.to_string()));
        match parsed {
            Ok(session) => sessions.push(session),
            Err(reason) => {
                tracing::warn!(fragment = %path.display(), %reason, "skipping bad fragment");
                recovered.push(RecoveredError::new(
                    RecoveredKind::BadFragment,
                    path.display().to_string(),
                    reason,
                ));
            }
        }
    }
    Ok((sessions, recovered))
}

impl CoverageStore {
    /// Record every fragment in `dir` and return how many sessions were read
    pub fn record_fragments(&mut self, dir: &Path, registry: &UnitRegistry) -> CubrirResult<usize> {
        let (sessions, recovered) = read_fragments(dir)?;
        for session in &sessions {
            self.record(session, registry);
        }
        for error in recovered {
            self.add_recovered(error);
        }
        Ok(sessions.len())
    }
}

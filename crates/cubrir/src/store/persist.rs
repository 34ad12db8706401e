//! Versioned JSON persistence for [`CoverageStore`]

use super::fragments::fragment_dir_for;
use super::CoverageStore;
use crate::result::{CubrirError, CubrirResult, RecoveredError};
use crate::unit::{LineSet, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// On-disk format version written by [`CoverageStore::save`]
pub const STORE_FORMAT: u32 = 1;

#[derive(Debug, Deserialize)]
struct FormatProbe {
    format: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredData {
    format: u32,
    units: BTreeMap<UnitId, LineSet>,
    #[serde(default)]
    recovered: Vec<RecoveredError>,
}

impl CoverageStore {
    /// Write the store to `path` as JSON, replacing any previous file
    pub fn save(&self, path: &Path) -> CubrirResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let data = StoredData {
            format: STORE_FORMAT,
            units: self.units.clone(),
            recovered: self.recovered.iter().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&data)?;

        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), units = data.units.len(), "store saved");
        Ok(())
    }

    /// Read a store written by [`save`](Self::save)
    pub fn load(path: &Path) -> CubrirResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let data_error = |message: String| CubrirError::DataFormat {
            path: path.display().to_string(),
            message,
        };

        let probe: FormatProbe =
            serde_json::from_str(&json).map_err(|e| data_error(e.to_string()))?;
        match probe.format {
            Some(STORE_FORMAT) => {}
            Some(other) => return Err(data_error(format!("unsupported format version {other}"))),
            None => return Err(data_error("missing format version".to_string())),
        }

        let data: StoredData = serde_json::from_str(&json).map_err(|e| data_error(e.to_string()))?;
        let mut store = Self::new();
        for (id, lines) in data.units {
            store.insert_lines(id, lines);
        }
        for error in data.recovered {
            store.add_recovered(error);
        }
        Ok(store)
    }

    /// Load `path` if it exists, else an empty store
    pub fn load_or_default(path: &Path) -> CubrirResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }
}

/// Delete the data file and its fragment directory
///
/// Returns whether anything was removed.
pub fn erase(data_file: &Path) -> CubrirResult<bool> {
    let mut removed = false;
    if data_file.exists() {
        std::fs::remove_file(data_file)?;
        removed = true;
    }
    let fragments = fragment_dir_for(data_file);
    if fragments.is_dir() {
        std::fs::remove_dir_all(&fragments)?;
        removed = true;
    }
    Ok(removed)
}

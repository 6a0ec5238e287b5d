// src/core/storage/snapshot.rs

//! Persists the whole ledger as a single JSON document.
//!
//! A save first writes a temporary file next to the target and then renames it
//! into place, so a crash mid-write never leaves a truncated snapshot behind.

use super::{LedgerRow, StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SNAPSHOT_VERSION: u32 = 1;

pub type LedgerMap = BTreeMap<String, Vec<LedgerRow>>;

#[derive(Serialize, Deserialize)]
struct SnapshotDocument {
    version: u32,
    entries: LedgerMap,
}

/// A snapshot file on disk.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the ledger. A missing file is an empty ledger.
    pub fn load(&self) -> StorageResult<LedgerMap> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "No snapshot found at {}. Starting with an empty ledger.",
                    self.path.display()
                );
                return Ok(LedgerMap::new());
            }
            Err(e) => return Err(e.into()),
        };
        let document: SnapshotDocument = serde_json::from_str(&contents)?;
        if document.version != SNAPSHOT_VERSION {
            return Err(StorageError::UnsupportedVersion(document.version));
        }
        info!(
            "Loaded {} entries from snapshot {}.",
            document.entries.len(),
            self.path.display()
        );
        Ok(document.entries)
    }

    /// Writes `entries` to the snapshot file atomically.
    pub fn save(&self, entries: &LedgerMap) -> StorageResult<()> {
        let document = SnapshotDocument {
            version: SNAPSHOT_VERSION,
            entries: entries.clone(),
        };
        let encoded = serde_json::to_vec(&document)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        let write_result = fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(&encoded)?;
            file.sync_all()
        });
        if let Err(e) = write_result {
            if let Err(remove_err) = fs::remove_file(&temp_path) {
                debug!(
                    "Failed to remove temporary snapshot file '{}': {}",
                    temp_path.display(),
                    remove_err
                );
            }
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            warn!(
                "Failed to rename temporary snapshot '{}' to '{}': {}",
                temp_path.display(),
                self.path.display(),
                e
            );
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        debug!("Snapshot saved to {}", self.path.display());
        Ok(())
    }

    /// Deletes the snapshot file, if present.
    pub fn remove(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed snapshot {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".tmp.{}", std::process::id()));
        self.path.with_file_name(name)
    }
}

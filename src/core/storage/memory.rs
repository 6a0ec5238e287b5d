// src/core/storage/memory.rs

//! The bundled `LedgerStore` backend: an ordered in-memory map, optionally
//! mirrored to a JSON snapshot after every mutation.

use super::snapshot::{LedgerMap, SnapshotFile};
use super::{
    AddOutcome, AppendOutcome, DeleteOutcome, HistoryPoint, LedgerEntry, LedgerRow, LedgerStore,
    StorageResult, ValueDelta, now_timestamp,
};
use parking_lot::Mutex;
use tracing::{debug, error};

#[derive(Debug)]
pub struct MemoryLedger {
    /// Every entry's rows, oldest first. The last row is the current one.
    rows: Mutex<LedgerMap>,
    snapshot: Option<SnapshotFile>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl MemoryLedger {
    /// A ledger that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            rows: Mutex::new(LedgerMap::new()),
            snapshot: None,
        }
    }

    /// Opens a ledger backed by `snapshot`. With `reset` set, any existing
    /// snapshot is discarded first.
    pub fn open(snapshot: SnapshotFile, reset: bool) -> StorageResult<Self> {
        if reset {
            snapshot.remove()?;
        }
        let rows = snapshot.load()?;
        Ok(Self {
            rows: Mutex::new(rows),
            snapshot: Some(snapshot),
        })
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Persists `rows` if a snapshot is configured. Must be called with the
    /// lock held so snapshots are written in mutation order.
    fn persist(&self, rows: &LedgerMap) -> StorageResult<()> {
        match &self.snapshot {
            Some(snapshot) => snapshot.save(rows).inspect_err(|e| {
                error!(
                    "Failed to write snapshot {}: {}",
                    snapshot.path().display(),
                    e
                );
            }),
            None => Ok(()),
        }
    }
}

impl LedgerStore for MemoryLedger {
    fn add(&self, name: &str) -> StorageResult<AddOutcome> {
        let mut rows = self.rows.lock();
        if rows.contains_key(name) {
            return Ok(AddOutcome::AlreadyExists);
        }
        rows.insert(name.to_string(), vec![LedgerRow::created_now()]);
        if let Err(e) = self.persist(&rows) {
            rows.remove(name);
            return Err(e);
        }
        debug!("Ledger entry '{}' created", name);
        Ok(AddOutcome::Created)
    }

    fn append_value(&self, name: &str, value: f64) -> StorageResult<AppendOutcome> {
        let mut rows = self.rows.lock();
        let Some(history) = rows.get_mut(name) else {
            return Ok(AppendOutcome::NotFound);
        };
        let Some(current) = history.last().cloned() else {
            return Ok(AppendOutcome::NotFound);
        };

        let delta = ValueDelta::between(current.value, value);
        let row = LedgerRow {
            value: Some(value),
            relative_increase: delta.relative,
            absolute_increase: delta.absolute,
            date: now_timestamp(),
        };
        // The creation row carries no value and is filled in place.
        let replaced = if delta.is_initial() {
            history.pop()
        } else {
            None
        };
        history.push(row);

        if let Err(e) = self.persist(&rows) {
            if let Some(history) = rows.get_mut(name) {
                history.pop();
                if let Some(original) = replaced {
                    history.push(original);
                }
            }
            return Err(e);
        }
        Ok(AppendOutcome::Updated(delta))
    }

    fn delete(&self, name: &str) -> StorageResult<DeleteOutcome> {
        let mut rows = self.rows.lock();
        let Some(removed) = rows.remove(name) else {
            return Ok(DeleteOutcome::NotFound);
        };
        if let Err(e) = self.persist(&rows) {
            rows.insert(name.to_string(), removed);
            return Err(e);
        }
        debug!("Ledger entry '{}' deleted", name);
        Ok(DeleteOutcome::Deleted)
    }

    fn list(&self) -> StorageResult<Vec<LedgerEntry>> {
        let rows = self.rows.lock();
        Ok(rows
            .iter()
            .filter_map(|(name, history)| {
                history.last().map(|row| LedgerEntry {
                    name: name.clone(),
                    value: row.value,
                    relative_increase: row.relative_increase,
                    absolute_increase: row.absolute_increase,
                    date: row.date.clone(),
                })
            })
            .collect())
    }

    fn history(&self, name: &str) -> StorageResult<Option<Vec<HistoryPoint>>> {
        let rows = self.rows.lock();
        Ok(rows.get(name).map(|history| {
            history
                .iter()
                .map(|row| HistoryPoint {
                    value: row.value,
                    date: row.date.clone(),
                })
                .collect()
        }))
    }
}

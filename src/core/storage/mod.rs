// src/core/storage/mod.rs

//! The storage port for ledger entries and its bundled backend.
//!
//! The dispatcher only talks to [`LedgerStore`]. Implementations serialize
//! their own read-modify-write sequences, so callers never lock around them.

pub mod memory;
pub mod snapshot;

pub use memory::MemoryLedger;
pub use snapshot::SnapshotFile;

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The timestamp format used for every ledger row.
pub const DATE_FORMAT: &str = "%Y-%b-%d %H:%M:%S";

/// Failures raised by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// One stored row of an entry's history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LedgerRow {
    /// `None` until the first value is recorded.
    pub value: Option<f64>,
    pub relative_increase: Option<f64>,
    pub absolute_increase: Option<f64>,
    pub date: String,
}

impl LedgerRow {
    /// The row written when an entry is created.
    pub fn created_now() -> Self {
        Self {
            value: None,
            relative_increase: None,
            absolute_increase: None,
            date: now_timestamp(),
        }
    }
}

/// The current state of one entry, as returned by `list`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub name: String,
    pub value: Option<f64>,
    pub relative_increase: Option<f64>,
    pub absolute_increase: Option<f64>,
    pub date: String,
}

/// A single point of an entry's history.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub value: Option<f64>,
    pub date: String,
}

/// The response body for a history request.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CurrencyHistory {
    pub name: String,
    pub history: Vec<HistoryPoint>,
}

/// The change recorded by a successful `append_value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueDelta {
    /// The value before the update, `None` for the first value of an entry.
    pub previous: Option<f64>,
    pub absolute: Option<f64>,
    pub relative: Option<f64>,
}

impl ValueDelta {
    /// Computes the delta between `previous` and `value`.
    ///
    /// The first value of an entry records no delta, and a relative change
    /// from zero is undefined.
    pub fn between(previous: Option<f64>, value: f64) -> Self {
        match previous {
            None => Self {
                previous: None,
                absolute: None,
                relative: None,
            },
            Some(prev) => {
                let absolute = value - prev;
                let relative = (prev != 0.0).then(|| absolute / prev);
                Self {
                    previous: Some(prev),
                    absolute: Some(absolute),
                    relative,
                }
            }
        }
    }

    pub fn is_initial(&self) -> bool {
        self.previous.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppendOutcome {
    Updated(ValueDelta),
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// CRUD and history operations on ledger entries.
///
/// All operations must be safe to call from several worker threads at once.
pub trait LedgerStore: Send + Sync {
    /// Creates `name` with no value if it does not exist yet.
    fn add(&self, name: &str) -> StorageResult<AddOutcome>;

    /// Records a new value for `name`, computing the delta from its current value.
    fn append_value(&self, name: &str, value: f64) -> StorageResult<AppendOutcome>;

    /// Removes `name` and its entire history.
    fn delete(&self, name: &str) -> StorageResult<DeleteOutcome>;

    /// The current row of every entry, ordered by name.
    fn list(&self) -> StorageResult<Vec<LedgerEntry>>;

    /// The full history of `name`, oldest first, or `None` if it does not exist.
    fn history(&self, name: &str) -> StorageResult<Option<Vec<HistoryPoint>>>;
}

pub(crate) fn now_timestamp() -> String {
    Local::now().format(DATE_FORMAT).to_string()
}

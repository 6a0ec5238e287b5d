// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
///
/// The `Display` text of each variant is exactly what a client receives in an
/// error-typed response. Variants carrying server-side detail (such as
/// `Storage`) keep that detail out of their message.
#[derive(Error, Debug, Clone)]
pub enum CurrencyDbError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Unknown message type")]
    UnknownMessageType,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Incorrect payload: {0}")]
    IncorrectPayload(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Currency already exists: {0}")]
    EntryExists(String),

    #[error("No such entry: {0}")]
    EntryNotFound(String),

    /// A failure reported by the storage backend. The payload is logged but
    /// never sent to the client.
    #[error("Database error")]
    Storage(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl PartialEq for CurrencyDbError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CurrencyDbError::Io(e1), CurrencyDbError::Io(e2)) => e1.to_string() == e2.to_string(),
            (CurrencyDbError::UnknownCommand(s1), CurrencyDbError::UnknownCommand(s2)) => s1 == s2,
            (CurrencyDbError::IncorrectPayload(s1), CurrencyDbError::IncorrectPayload(s2)) => {
                s1 == s2
            }
            (CurrencyDbError::InvalidArgument(s1), CurrencyDbError::InvalidArgument(s2)) => {
                s1 == s2
            }
            (CurrencyDbError::EntryExists(s1), CurrencyDbError::EntryExists(s2)) => s1 == s2,
            (CurrencyDbError::EntryNotFound(s1), CurrencyDbError::EntryNotFound(s2)) => s1 == s2,
            (CurrencyDbError::Storage(s1), CurrencyDbError::Storage(s2)) => s1 == s2,
            (CurrencyDbError::Internal(s1), CurrencyDbError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl CurrencyDbError {
    /// True for I/O errors that just mean the peer went away.
    pub fn is_normal_disconnect(&self) -> bool {
        match self {
            CurrencyDbError::ConnectionClosed => true,
            CurrencyDbError::Io(arc_err) => matches!(
                arc_err.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for CurrencyDbError {
    fn from(e: std::io::Error) -> Self {
        CurrencyDbError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for CurrencyDbError {
    fn from(e: serde_json::Error) -> Self {
        CurrencyDbError::IncorrectPayload(e.to_string())
    }
}

impl From<std::str::Utf8Error> for CurrencyDbError {
    fn from(_: std::str::Utf8Error) -> Self {
        CurrencyDbError::IncorrectPayload("payload is not valid UTF-8".to_string())
    }
}

impl From<crate::core::storage::StorageError> for CurrencyDbError {
    fn from(e: crate::core::storage::StorageError) -> Self {
        CurrencyDbError::Storage(e.to_string())
    }
}

// src/server/errors.rs

use crate::core::CurrencyDbError;
use crate::core::storage::StorageError;
use std::io;
use thiserror::Error;

/// A failure that prevents the server from starting. Each stage maps to a
/// distinct process exit code.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to make the listening socket non-blocking: {0}")]
    NonBlocking(#[source] io::Error),

    #[error("Failed to set up readiness polling: {0}")]
    Poll(#[source] io::Error),

    #[error("Failed to open ledger storage: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to start server threads: {0}")]
    Threads(String),
}

impl StartupError {
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Config(_) => 1,
            StartupError::Bind { .. } => 2,
            StartupError::NonBlocking(_) => 3,
            StartupError::Poll(_) => 4,
            StartupError::Storage(_) => 5,
            StartupError::Threads(_) => 6,
        }
    }
}

impl From<CurrencyDbError> for StartupError {
    fn from(e: CurrencyDbError) -> Self {
        StartupError::Threads(e.to_string())
    }
}

// src/server/initialization.rs

//! Handles the server initialization process, from storage loading to the
//! listener and the reactor thread.

use super::LogReloadHandle;
use super::context::ServerContext;
use super::errors::StartupError;
use super::handle::Server;
use crate::config::{Config, StorageConfig};
use crate::core::storage::{LedgerStore, MemoryLedger, SnapshotFile};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Initializes all server components before starting the control loop.
pub async fn setup(
    config: Config,
    log_reload_handle: Arc<LogReloadHandle>,
) -> Result<ServerContext, StartupError> {
    config
        .validate()
        .map_err(|e| StartupError::Config(format!("{e:#}")))?;
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let store = open_store(&config.storage)?;
    let server = Arc::new(Server::start(&config, store)?);

    Ok(ServerContext {
        config,
        server,
        log_reload_handle,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        console_rx: None,
    })
}

/// Opens the ledger backend described by `storage`.
pub fn open_store(storage: &StorageConfig) -> Result<Arc<dyn LedgerStore>, StartupError> {
    let Some(path) = &storage.path else {
        info!("No storage path configured. The ledger lives in memory only.");
        return Ok(Arc::new(MemoryLedger::in_memory()));
    };

    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| StartupError::Storage(e.into()))?;
        info!("Created storage directory: {}", parent.display());
    }

    if storage.reset_on_start {
        warn!("storage.reset_on_start is set. Discarding the snapshot at '{}'.", path);
    }
    let ledger = MemoryLedger::open(SnapshotFile::new(path), storage.reset_on_start)?;
    info!(
        "Ledger loaded from '{}' with {} currencies.",
        path,
        ledger.len()
    );
    Ok(Arc::new(ledger))
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!(
        "Starting CurrencyDB {} on {}.",
        env!("CARGO_PKG_VERSION"),
        config.listen_addr()
    );
    info!(
        "Worker pool: {} threads, {:?} ordering. Client limit: {}.",
        config.workers.threads, config.workers.ordering, config.max_clients
    );
}

// src/server/context.rs

use super::LogReloadHandle;
use super::handle::Server;
use crate::config::Config;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

/// Holds all the initialized state required to run the server's control loop.
pub struct ServerContext {
    pub config: Config,
    pub server: Arc<Server>,
    pub log_reload_handle: Arc<LogReloadHandle>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
    /// Lines typed on the operator console. `None` until the reader is spawned.
    pub console_rx: Option<mpsc::UnboundedReceiver<String>>,
}

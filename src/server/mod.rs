// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{filter::EnvFilter, reload};

mod console;
mod context;
mod control_loop;
mod errors;
mod handle;
mod initialization;
mod metrics_server;
mod reactor;
mod spawner;

pub use console::{ConsoleCommand, ConsoleOutcome, execute as execute_console_command};
pub use errors::StartupError;
pub use handle::Server;
pub use initialization::open_store;

/// Handle used to swap the log filter at runtime.
pub type LogReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config, log_reload_handle: Arc<LogReloadHandle>) -> Result<()> {
    // 1. Open storage, bind the listener and start the reactor and workers.
    let mut server_context = initialization::setup(config, log_reload_handle).await?;

    // 2. Spawn all background tasks.
    spawner::spawn_all(&mut server_context).await?;

    // 3. Run until shutdown is requested.
    control_loop::run(server_context).await
}

// src/server/spawner.rs

//! Spawns the server's long-running background tasks.

use super::context::ServerContext;
use super::metrics_server;
use anyhow::{Result, anyhow};
use std::io::{self, BufRead};
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Spawns all background tasks into the context's JoinSet and starts the
/// console reader.
pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    // --- Metrics Server ---
    if ctx.config.metrics.enabled {
        let port = ctx.config.metrics.port;
        let shutdown_rx_metrics = ctx.shutdown_tx.subscribe();
        ctx.background_tasks.spawn(async move {
            metrics_server::run_metrics_server(port, shutdown_rx_metrics).await;
            Ok(())
        });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    // --- Operator Console ---
    ctx.console_rx = Some(spawn_console_reader()?);

    info!("All background tasks have been spawned.");
    Ok(())
}

/// Reads stdin on a plain thread. A blocking read inside the runtime would
/// keep the process alive after shutdown, so lines are forwarded instead.
fn spawn_console_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name("currencydb-console".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!("Console read failed: {}", e);
                        return;
                    }
                }
            }
            debug!("Console input closed");
        })
        .map_err(|e| anyhow!("Failed to spawn console thread: {}", e))?;
    Ok(rx)
}

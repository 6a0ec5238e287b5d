// src/server/control_loop.rs

//! The main control loop: waits for signals, console commands and background
//! task failures, then drives an orderly shutdown.

use super::console::{self, ConsoleCommand};
use super::context::ServerContext;
use anyhow::{Result, anyhow};
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

/// Runs until a shutdown is requested, then stops the server.
pub async fn run(mut ctx: ServerContext) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))?;
    let mut console_rx = ctx.console_rx.take();

    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            line = recv_line(&mut console_rx) => {
                let Some(line) = line else {
                    info!("Console input closed. Server keeps running until signalled.");
                    console_rx = None;
                    continue;
                };
                if handle_console_line(&ctx, &line) {
                    break;
                }
            },

            _ = tokio::time::sleep(ctx.config.reactor.poll_timeout()) => {
                if !ctx.server.is_active() {
                    error!("CRITICAL: Reactor stopped unexpectedly. Shutting down.");
                    break;
                }
            }
        }
    }

    info!("Shutting down. Sending signal to all tasks.");
    let _ = ctx.shutdown_tx.send(());

    // Joining the reactor and the workers blocks, so it runs off the runtime.
    let server = Arc::clone(&ctx.server);
    if let Err(e) = tokio::task::spawn_blocking(move || server.stop()).await {
        error!("Server shutdown panicked: {e:?}");
    }

    while let Some(res) = ctx.background_tasks.join_next().await {
        if let Err(e) = res {
            warn!("Background task ended abnormally during shutdown: {e:?}");
        }
    }
    info!("Shutdown complete.");
    Ok(())
}

async fn recv_line(
    console_rx: &mut Option<tokio::sync::mpsc::UnboundedReceiver<String>>,
) -> Option<String> {
    match console_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Executes one console line. Returns true when it asked for shutdown.
fn handle_console_line(ctx: &ServerContext, line: &str) -> bool {
    match ConsoleCommand::parse(line) {
        Ok(Some(command)) => {
            let outcome =
                console::execute(command, &ctx.server, Some(ctx.log_reload_handle.as_ref()));
            println!("{}", outcome.output);
            outcome.shutdown
        }
        Ok(None) => false,
        Err(e) => {
            println!("{e}. Type 'help' for the list of commands.");
            false
        }
    }
}

// src/server/console.rs

//! Operator console: line-oriented commands read from standard input.

use super::LogReloadHandle;
use super::handle::Server;
use crate::connection::ConnectionId;
use crate::core::CurrencyDbError;
use tracing_subscriber::filter::EnvFilter;

const HELP: &str = "help: print this help message
list: list connected clients
kill [id]: disconnect client with specified id
killall: disconnect all clients
stats: print server counters
loglevel [filter]: change the log filter, e.g. `debug` or `info,currencydb=trace`
shutdown: shutdown server";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    List,
    Kill(ConnectionId),
    KillAll,
    Stats,
    LogLevel(String),
    Shutdown,
}

impl ConsoleCommand {
    /// Parses one console line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, CurrencyDbError> {
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            return Ok(None);
        };
        let argument = parts.next();
        if parts.next().is_some() {
            return Err(CurrencyDbError::InvalidArgument(format!(
                "too many arguments for '{keyword}'"
            )));
        }

        let command = match (keyword.to_ascii_lowercase().as_str(), argument) {
            ("help", None) => ConsoleCommand::Help,
            ("list", None) => ConsoleCommand::List,
            ("killall", None) => ConsoleCommand::KillAll,
            ("stats", None) => ConsoleCommand::Stats,
            ("shutdown", None) => ConsoleCommand::Shutdown,
            ("kill", Some(id)) => {
                let id = id.parse::<ConnectionId>().map_err(|_| {
                    CurrencyDbError::InvalidArgument(format!("invalid client id '{id}'"))
                })?;
                ConsoleCommand::Kill(id)
            }
            ("kill", None) => {
                return Err(CurrencyDbError::InvalidArgument(
                    "kill needs a client id".to_string(),
                ));
            }
            ("loglevel", Some(filter)) => ConsoleCommand::LogLevel(filter.to_string()),
            ("loglevel", None) => {
                return Err(CurrencyDbError::InvalidArgument(
                    "loglevel needs a filter".to_string(),
                ));
            }
            ("help" | "list" | "killall" | "stats" | "shutdown", Some(_)) => {
                return Err(CurrencyDbError::InvalidArgument(format!(
                    "'{keyword}' takes no arguments"
                )));
            }
            _ => return Err(CurrencyDbError::UnknownCommand(keyword.to_string())),
        };
        Ok(Some(command))
    }
}

/// Result of running a console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleOutcome {
    pub output: String,
    pub shutdown: bool,
}

impl ConsoleOutcome {
    fn print(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            shutdown: false,
        }
    }
}

/// Runs `command` against `server`.
pub fn execute(
    command: ConsoleCommand,
    server: &Server,
    log_reload_handle: Option<&LogReloadHandle>,
) -> ConsoleOutcome {
    match command {
        ConsoleCommand::Help => ConsoleOutcome::print(HELP),
        ConsoleCommand::List => ConsoleOutcome::print(server.list_clients()),
        ConsoleCommand::Kill(id) => {
            if server.close_client(id) {
                ConsoleOutcome::print(format!("Client {id} disconnected"))
            } else {
                ConsoleOutcome::print(format!("No such client: {id}"))
            }
        }
        ConsoleCommand::KillAll => {
            let closed = server.close_all_clients();
            ConsoleOutcome::print(format!("Disconnected {closed} clients"))
        }
        ConsoleCommand::Stats => {
            let stats = server.stats();
            ConsoleOutcome::print(format!(
                "connected_clients: {}\ntotal_connections: {}\nrejected_connections: {}\ntotal_messages: {}\ntotal_errors: {}\npending_tasks: {}",
                server.client_count(),
                stats.total_connections,
                stats.rejected_connections,
                stats.total_messages,
                stats.total_errors,
                server.pending_tasks(),
            ))
        }
        ConsoleCommand::LogLevel(filter) => {
            let Some(handle) = log_reload_handle else {
                return ConsoleOutcome::print("Log level cannot be changed in this process");
            };
            match EnvFilter::try_new(&filter) {
                Ok(new_filter) => match handle.reload(new_filter) {
                    Ok(()) => ConsoleOutcome::print(format!("Log filter set to '{filter}'")),
                    Err(e) => ConsoleOutcome::print(format!("Failed to reload log filter: {e}")),
                },
                Err(e) => ConsoleOutcome::print(format!("Invalid log filter '{filter}': {e}")),
            }
        }
        ConsoleCommand::Shutdown => ConsoleOutcome {
            output: "Shutting down".to_string(),
            shutdown: true,
        },
    }
}

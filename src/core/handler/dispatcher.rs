// src/core/handler/dispatcher.rs

//! Turns one framed message into at most one response and delivers it.

use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::core::CurrencyDbError;
use crate::core::metrics;
use crate::core::protocol::{ControlCommand, Message, Request};
use crate::core::state::StatsState;
use crate::core::storage::{AddOutcome, AppendOutcome, CurrencyHistory, DeleteOutcome, LedgerStore};
use crate::core::workers::{Task, TaskHandler};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// What the dispatcher decided to do with a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Write this message back to the sender.
    Reply(Message),
    /// Close the sender's connection without replying.
    Disconnect,
}

pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    store: Arc<dyn LedgerStore>,
    stats: Arc<StatsState>,
    write_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        store: Arc<dyn LedgerStore>,
        stats: Arc<StatsState>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            stats,
            write_timeout,
        }
    }

    /// Decodes `frame` and runs it against the store.
    pub fn dispatch(&self, frame: &[u8]) -> Response {
        let result = match Message::parse(frame) {
            Ok(message) => {
                metrics::MESSAGES_PROCESSED_TOTAL
                    .with_label_values(&[message.kind().as_str()])
                    .inc();
                self.process_message(message)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                if let CurrencyDbError::Storage(detail) = &e {
                    error!("Storage failure: {}", detail);
                    metrics::STORAGE_ERRORS_TOTAL.inc();
                }
                metrics::ERROR_RESPONSES_TOTAL.inc();
                self.stats.increment_total_errors();
                Response::Reply(Message::error(&e))
            }
        }
    }

    fn process_message(&self, message: Message) -> Result<Response, CurrencyDbError> {
        match message {
            Message::Text(text) => Ok(Response::Reply(Message::Text(text))),
            Message::Command(keyword) => self.process_command(ControlCommand::parse(&keyword)),
            Message::Json(payload) => {
                let request = Request::parse(&payload)?;
                self.process_request(request).map(Response::Reply)
            }
            // Error messages only ever travel from server to client.
            Message::Error(_) => Err(CurrencyDbError::UnknownMessageType),
        }
    }

    fn process_command(&self, command: ControlCommand) -> Result<Response, CurrencyDbError> {
        match command {
            ControlCommand::Disconnect => Ok(Response::Disconnect),
            ControlCommand::ListAll => {
                let entries = self.store.list()?;
                Ok(Response::Reply(Message::json(&entries)?))
            }
            ControlCommand::Unknown(keyword) => Err(CurrencyDbError::UnknownCommand(keyword)),
        }
    }

    fn process_request(&self, request: Request) -> Result<Message, CurrencyDbError> {
        match request {
            Request::AddEntry { name } => match self.store.add(&name)? {
                AddOutcome::Created => {
                    Ok(Message::text(format!("Successfully add currency {name}")))
                }
                AddOutcome::AlreadyExists => Err(CurrencyDbError::EntryExists(name)),
            },
            Request::AddValue { name, value } => match self.store.append_value(&name, value)? {
                AppendOutcome::Updated(delta) => {
                    debug!("Currency {} set to {} ({:?})", name, value, delta);
                    Ok(Message::text(format!("Successfully add value for currency {name}")))
                }
                AppendOutcome::NotFound => Err(CurrencyDbError::EntryNotFound(name)),
            },
            Request::DeleteEntry { name } => match self.store.delete(&name)? {
                DeleteOutcome::Deleted => {
                    Ok(Message::text(format!("Successfully del currency {name}")))
                }
                DeleteOutcome::NotFound => Err(CurrencyDbError::EntryNotFound(name)),
            },
            Request::GetHistory { name } => match self.store.history(&name)? {
                Some(history) => Message::json(&CurrencyHistory { name, history }),
                None => Err(CurrencyDbError::EntryNotFound(name)),
            },
        }
    }

    /// Delivers a response to `connection_id`, resolving the connection only
    /// now. A connection that is already gone silently drops the response.
    ///
    /// A failed send may have left part of a frame on the wire, so the
    /// connection is torn down rather than kept for later responses.
    fn deliver(&self, connection_id: ConnectionId, response: Response) {
        match response {
            Response::Disconnect => {
                debug!("Client {} requested disconnect", connection_id);
                self.registry.unregister(connection_id);
            }
            Response::Reply(message) => {
                let Some(conn) = self.registry.get(connection_id) else {
                    debug!(
                        "Dropping {} response: connection {} is gone",
                        message.kind().as_str(),
                        connection_id
                    );
                    return;
                };
                if let Err(e) = conn.send(&message, self.write_timeout) {
                    metrics::RESPONSE_WRITE_FAILURES_TOTAL.inc();
                    if e.is_normal_disconnect() {
                        debug!("Response to {} not delivered: {}", connection_id, e);
                    } else {
                        warn!(
                            "Error in send for client {} ({}): {}",
                            connection_id,
                            conn.addr(),
                            e
                        );
                    }
                    self.registry.unregister(connection_id);
                }
            }
        }
    }
}

impl TaskHandler for Dispatcher {
    fn handle(&self, task: Task) {
        let started = Instant::now();
        debug!(
            "Client {}: processing {} byte message",
            task.connection_id,
            task.frame.len()
        );
        self.stats.increment_total_messages();
        let response = self.dispatch(&task.frame);
        self.deliver(task.connection_id, response);
        metrics::DISPATCH_LATENCY_SECONDS.observe(started.elapsed().as_secs_f64());
    }
}

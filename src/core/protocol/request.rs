// src/core/protocol/request.rs

//! Typed requests carried inside command and JSON messages.

use super::message::Message;
use crate::core::CurrencyDbError;
use serde::{Deserialize, Serialize};

/// The command keyword that closes the sender's connection.
pub const DISCONNECT_KEYWORD: &str = "disconnect";
/// The command keyword that lists every ledger entry.
pub const LIST_ALL_KEYWORD: &str = "list";

/// A control command sent as a `CM` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Disconnect,
    ListAll,
    Unknown(String),
}

impl ControlCommand {
    pub fn parse(keyword: &str) -> Self {
        match keyword.trim() {
            DISCONNECT_KEYWORD => ControlCommand::Disconnect,
            LIST_ALL_KEYWORD => ControlCommand::ListAll,
            other => ControlCommand::Unknown(other.to_string()),
        }
    }

    pub fn keyword(&self) -> &str {
        match self {
            ControlCommand::Disconnect => DISCONNECT_KEYWORD,
            ControlCommand::ListAll => LIST_ALL_KEYWORD,
            ControlCommand::Unknown(s) => s,
        }
    }

    pub fn to_message(&self) -> Message {
        Message::command(self.keyword())
    }
}

/// A ledger request sent as a `JS` message, selected by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    AddEntry {
        #[serde(alias = "currency")]
        name: String,
    },
    AddValue {
        #[serde(alias = "currency")]
        name: String,
        value: f64,
    },
    DeleteEntry {
        #[serde(alias = "currency")]
        name: String,
    },
    GetHistory {
        #[serde(alias = "currency")]
        name: String,
    },
}

impl Request {
    /// Parses a JSON payload. Malformed JSON, a missing field or an unknown
    /// `type` all map to `IncorrectPayload`.
    pub fn parse(payload: &str) -> Result<Self, CurrencyDbError> {
        let request: Request = serde_json::from_str(payload)?;
        if request.name().trim().is_empty() {
            return Err(CurrencyDbError::IncorrectPayload(
                "name cannot be empty".to_string(),
            ));
        }
        if let Request::AddValue { value, .. } = &request
            && !value.is_finite()
        {
            return Err(CurrencyDbError::IncorrectPayload(
                "value must be a finite number".to_string(),
            ));
        }
        Ok(request)
    }

    pub fn name(&self) -> &str {
        match self {
            Request::AddEntry { name }
            | Request::AddValue { name, .. }
            | Request::DeleteEntry { name }
            | Request::GetHistory { name } => name,
        }
    }

    /// The `type` string this request is tagged with on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            Request::AddEntry { .. } => "add-entry",
            Request::AddValue { .. } => "add-value",
            Request::DeleteEntry { .. } => "delete-entry",
            Request::GetHistory { .. } => "get-history",
        }
    }

    /// Encodes the request as a JSON message, as a client would send it.
    pub fn to_message(&self) -> Result<Message, CurrencyDbError> {
        Message::json(self)
    }
}

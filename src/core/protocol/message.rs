// src/core/protocol/message.rs

//! Implements the typed message layer on top of the framer and the
//! corresponding `Encoder` and `Decoder` for network communication.
//!
//! Every message on the wire is `<2-byte tag><payload><delimiter>`.

use super::framer::{DELIMITER, MessageFramer};
use crate::core::CurrencyDbError;
use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Width of the type tag at the start of every payload.
pub const TAG_LEN: usize = 2;

const TEXT_TAG: &[u8; TAG_LEN] = b"TX";
const COMMAND_TAG: &[u8; TAG_LEN] = b"CM";
const JSON_TAG: &[u8; TAG_LEN] = b"JS";
const ERROR_TAG: &[u8; TAG_LEN] = b"ER";

/// The four message types understood by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Command,
    Json,
    Error,
}

impl MessageKind {
    /// The wire tag for this kind.
    pub const fn tag(self) -> &'static [u8; TAG_LEN] {
        match self {
            MessageKind::Text => TEXT_TAG,
            MessageKind::Command => COMMAND_TAG,
            MessageKind::Json => JSON_TAG,
            MessageKind::Error => ERROR_TAG,
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            t if t == TEXT_TAG => Some(MessageKind::Text),
            t if t == COMMAND_TAG => Some(MessageKind::Command),
            t if t == JSON_TAG => Some(MessageKind::Json),
            t if t == ERROR_TAG => Some(MessageKind::Error),
            _ => None,
        }
    }

    /// A short lowercase name, used as a metrics label.
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Command => "command",
            MessageKind::Json => "json",
            MessageKind::Error => "error",
        }
    }
}

/// A single decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Free-form text, echoed back by the server byte for byte.
    Text(Bytes),
    /// A bare control keyword such as `disconnect` or `list`.
    Command(String),
    /// A serialized JSON object or array.
    Json(String),
    /// A human-readable failure description. Only ever sent by the server.
    Error(String),
}

impl Message {
    pub fn text(s: impl Into<String>) -> Self {
        Message::Text(Bytes::from(s.into()))
    }

    pub fn command(s: impl Into<String>) -> Self {
        Message::Command(s.into())
    }

    pub fn error(e: &CurrencyDbError) -> Self {
        Message::Error(e.to_string())
    }

    /// Serializes `value` into a JSON message.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, CurrencyDbError> {
        serde_json::to_string(value)
            .map(Message::Json)
            .map_err(|e| CurrencyDbError::Internal(format!("failed to encode response: {e}")))
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Text(_) => MessageKind::Text,
            Message::Command(_) => MessageKind::Command,
            Message::Json(_) => MessageKind::Json,
            Message::Error(_) => MessageKind::Error,
        }
    }

    /// The payload bytes, without tag or delimiter.
    pub fn payload(&self) -> &[u8] {
        match self {
            Message::Text(b) => b,
            Message::Command(s) | Message::Json(s) | Message::Error(s) => s.as_bytes(),
        }
    }

    /// Parses one frame (as produced by the framer) into a typed message.
    pub fn parse(frame: &[u8]) -> Result<Self, CurrencyDbError> {
        if frame.len() < TAG_LEN {
            return Err(CurrencyDbError::UnknownMessageType);
        }
        let (tag, payload) = frame.split_at(TAG_LEN);
        let kind = MessageKind::from_tag(tag).ok_or(CurrencyDbError::UnknownMessageType)?;
        let message = match kind {
            MessageKind::Text => Message::Text(Bytes::copy_from_slice(payload)),
            MessageKind::Command => Message::Command(std::str::from_utf8(payload)?.to_string()),
            MessageKind::Json => Message::Json(std::str::from_utf8(payload)?.to_string()),
            MessageKind::Error => Message::Error(String::from_utf8_lossy(payload).into_owned()),
        };
        Ok(message)
    }

    /// A convenience method to encode a message into a `Vec<u8>`, ready to be
    /// written to a socket.
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let payload = self.payload();
        let mut buf = Vec::with_capacity(TAG_LEN + payload.len() + DELIMITER.len());
        buf.extend_from_slice(self.kind().tag());
        buf.extend_from_slice(payload);
        buf.extend_from_slice(DELIMITER);
        buf
    }
}

/// A `tokio_util::codec` implementation for encoding and decoding `Message`s.
#[derive(Debug, Default)]
pub struct MessageCodec {
    framer: MessageFramer,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CurrencyDbError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(item.kind().tag());
        dst.extend_from_slice(item.payload());
        dst.extend_from_slice(DELIMITER);
        Ok(())
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CurrencyDbError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.framer.decode(src)? {
            Some(frame) => Message::parse(&frame).map(Some),
            None => Ok(None),
        }
    }
}

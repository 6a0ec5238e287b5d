// src/core/protocol/mod.rs

pub mod framer;
pub mod message;
pub mod request;
pub use framer::{DELIMITER, InboundBuffer, MessageFramer, extract_one};
pub use message::{Message, MessageCodec, MessageKind, TAG_LEN};
pub use request::{ControlCommand, Request};

// src/core/protocol/framer.rs

//! Splits a connection's inbound byte stream into delimiter-terminated frames.
//!
//! A frame is everything before the first occurrence of [`DELIMITER`]. The
//! framer never interprets the bytes it hands out and enforces no maximum
//! frame size: a peer that never sends the delimiter grows its buffer without
//! bound.

use crate::core::CurrencyDbError;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

/// The byte sequence terminating every message on the wire.
pub const DELIMITER: &[u8] = b"\r\n";
const DELIMITER_LEN: usize = DELIMITER.len();

/// Removes the first complete frame from `buffer`, if there is one.
///
/// On a match the frame (without the delimiter) is returned and the frame plus
/// its delimiter are consumed from the front of the buffer. Bytes after the
/// delimiter are left in place for the next call.
pub fn extract_one(buffer: &mut BytesMut) -> Option<Bytes> {
    let pos = find_delimiter(buffer)?;
    Some(take_frame(buffer, pos))
}

/// A stateful framer that remembers how far it has already scanned, so a large
/// partial message is not rescanned from the start on every read.
#[derive(Debug, Default)]
pub struct MessageFramer {
    scanned: usize,
}

impl MessageFramer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for MessageFramer {
    type Item = Bytes;
    type Error = CurrencyDbError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // A delimiter may straddle the previous scan boundary.
        let start = self.scanned.saturating_sub(DELIMITER_LEN - 1).min(src.len());
        match find_delimiter(&src[start..]) {
            Some(offset) => {
                self.scanned = 0;
                Ok(Some(take_frame(src, start + offset)))
            }
            None => {
                self.scanned = src.len();
                Ok(None)
            }
        }
    }
}

/// A connection's inbound buffer together with its framer state.
#[derive(Debug, Default)]
pub struct InboundBuffer {
    buffer: BytesMut,
    framer: MessageFramer,
}

impl InboundBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Returns the next complete frame, if one has fully arrived.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        // The framer itself never fails.
        self.framer.decode(&mut self.buffer).ok().flatten()
    }

    /// Number of buffered bytes not yet consumed as frames.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn take_frame(buffer: &mut BytesMut, pos: usize) -> Bytes {
    let frame = buffer.split_to(pos).freeze();
    buffer.advance(DELIMITER_LEN);
    frame
}

/// Helper function to find the next delimiter in a buffer.
fn find_delimiter(src: &[u8]) -> Option<usize> {
    src.windows(DELIMITER_LEN)
        .position(|window| window == DELIMITER)
}

// src/connection/conn.rs

//! Defines `Connection`, the shared state of one accepted client socket.

use crate::core::CurrencyDbError;
use crate::core::protocol::Message;
use mio::net::TcpStream;
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// Opaque identity of a connection. Never reused within one process.
pub type ConnectionId = u64;

/// Pause between write attempts while the socket's send buffer is full.
const WRITE_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// One client connection.
///
/// The reactor reads from the socket; worker threads write to it through
/// [`Connection::send`], which serializes writers with a per-connection lock.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    addr: SocketAddr,
    stream: TcpStream,
    alive: AtomicBool,
    write_lock: Mutex<()>,
}

impl Connection {
    pub fn new(id: ConnectionId, stream: TcpStream, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            stream,
            alive: AtomicBool::new(true),
            write_lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// A single non-blocking read. Only the reactor thread calls this.
    pub(crate) fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.stream).read(buf)
    }

    /// Writes one framed message to the peer.
    ///
    /// The socket is non-blocking, so a full send buffer is retried until
    /// `write_timeout` elapses. The whole message is written under the write
    /// lock, so responses from different workers never interleave.
    pub fn send(&self, message: &Message, write_timeout: Duration) -> Result<(), CurrencyDbError> {
        let bytes = message.encode_to_vec();
        let _guard = self.write_lock.lock();
        let deadline = Instant::now() + write_timeout;
        let mut written = 0;

        while written < bytes.len() {
            if !self.is_alive() {
                return Err(CurrencyDbError::ConnectionClosed);
            }
            match (&self.stream).write(&bytes[written..]) {
                Ok(0) => {
                    return Err(io::Error::from(io::ErrorKind::WriteZero).into());
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("send buffer stayed full for {write_timeout:?}"),
                        )
                        .into());
                    }
                    std::thread::sleep(WRITE_RETRY_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Marks the connection dead and shuts the socket down in both directions.
    /// The descriptor itself is closed when the last reference is dropped.
    pub(crate) fn close(&self) {
        if self.alive.swap(false, Ordering::AcqRel)
            && let Err(e) = self.stream.shutdown(Shutdown::Both)
        {
            debug!("Shutdown of connection {} ({}) failed: {}", self.id, self.addr, e);
        }
    }
}

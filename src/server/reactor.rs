// src/server/reactor.rs

//! The I/O reactor: a single thread that owns the listening socket, waits for
//! readiness on it and on every client socket, accepts connections, reads
//! bytes into per-connection buffers and hands complete frames to the worker
//! pool.
//!
//! The reactor never blocks anywhere except inside `Poll::poll`, whose wait is
//! bounded by the configured timeout and cut short by the waker on shutdown.
//! Inbound buffers are owned by this thread alone; workers only ever write.

use crate::connection::{Connection, ConnectionId, ConnectionRegistry};
use crate::core::metrics;
use crate::core::protocol::InboundBuffer;
use crate::core::state::StatsState;
use crate::core::workers::{Task, WorkerPool};
use mio::event::Event;
use mio::net::TcpListener;
use mio::{Events, Poll, Token};
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Token of the listening socket.
pub const LISTENER: Token = Token(0);
/// Token of the shutdown waker.
pub const WAKER: Token = Token(usize::MAX);

/// Tuning knobs for the reactor loop.
#[derive(Debug, Clone)]
pub struct ReactorSettings {
    pub poll_timeout: Duration,
    pub max_events: usize,
    pub read_buffer_size: usize,
    pub max_clients: usize,
}

/// What a read pass decided about the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadOutcome {
    Open,
    Closed,
}

pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    pool: Arc<WorkerPool>,
    stats: Arc<StatsState>,
    terminate: Arc<AtomicBool>,
    inbound: HashMap<ConnectionId, InboundBuffer>,
    /// Set when accepting stopped on an error with connections possibly still
    /// queued. No new readiness edge arrives for those.
    accept_backlog: bool,
    read_buf: Vec<u8>,
    settings: ReactorSettings,
}

impl Reactor {
    /// Builds a reactor. The listener must already be registered with `poll`
    /// under [`LISTENER`].
    pub fn new(
        poll: Poll,
        listener: TcpListener,
        registry: Arc<ConnectionRegistry>,
        pool: Arc<WorkerPool>,
        stats: Arc<StatsState>,
        terminate: Arc<AtomicBool>,
        settings: ReactorSettings,
    ) -> Self {
        Self {
            poll,
            listener,
            registry,
            pool,
            stats,
            terminate,
            inbound: HashMap::new(),
            accept_backlog: false,
            read_buf: vec![0; settings.read_buffer_size.max(1)],
            settings,
        }
    }

    /// Runs until the termination flag is set. The listener is closed when
    /// this returns.
    pub fn run(mut self) {
        let mut events = Events::with_capacity(self.settings.max_events.max(1));
        match self.listener.local_addr() {
            Ok(addr) => info!("Reactor started on {}", addr),
            Err(_) => info!("Reactor started"),
        }

        while !self.terminate.load(Ordering::Acquire) {
            if let Err(e) = self.poll.poll(&mut events, Some(self.settings.poll_timeout)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!("Readiness wait failed: {}. Stopping reactor.", e);
                self.terminate.store(true, Ordering::Release);
                break;
            }

            if self.accept_backlog {
                self.accept_connections();
            }
            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_connections(),
                    WAKER => debug!("Reactor woken up"),
                    token => self.handle_client_event(token.0 as ConnectionId, event),
                }
            }

            self.prune_buffers();
        }

        info!(
            "Reactor stopped. Closing listener ({} clients still registered).",
            self.registry.len()
        );
    }

    /// Accepts every pending connection. Readiness is edge-triggered, so the
    /// listener is drained until it would block.
    fn accept_connections(&mut self) {
        self.accept_backlog = false;
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    self.stats.increment_total_connections();
                    metrics::CONNECTIONS_RECEIVED_TOTAL.inc();

                    if self.registry.len() >= self.settings.max_clients {
                        warn!(
                            "Rejecting connection from {}: max_clients ({}) reached",
                            addr, self.settings.max_clients
                        );
                        self.stats.increment_rejected_connections();
                        metrics::CONNECTIONS_REJECTED_TOTAL.inc();
                        continue;
                    }

                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
                    }
                    let id = self.registry.next_id();
                    match self.registry.register(Connection::new(id, stream, addr)) {
                        Ok(_) => {
                            info!("New connection from {} on id {}", addr, id);
                            self.inbound.insert(id, InboundBuffer::new());
                        }
                        Err(e) => warn!("Failed to register connection from {}: {}", addr, e),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Failed to accept connection: {}. Retrying on the next tick.", e);
                    self.accept_backlog = true;
                    break;
                }
            }
        }
    }

    fn handle_client_event(&mut self, id: ConnectionId, event: &Event) {
        let mut closed = false;
        if event.is_readable() || event.is_read_closed() {
            closed = self.read_available(id) == ReadOutcome::Closed;
        }
        if !closed && event.is_error() {
            warn!("Socket error reported for client {}", id);
            closed = true;
        }
        if closed {
            self.teardown(id);
        }
    }

    /// Reads everything currently available from `id`, then submits every
    /// complete frame now sitting in its buffer.
    fn read_available(&mut self, id: ConnectionId) -> ReadOutcome {
        let Some(conn) = self.registry.get(id) else {
            // Closed by a worker or the console since the event was queued.
            self.inbound.remove(&id);
            return ReadOutcome::Closed;
        };
        let inbound = self.inbound.entry(id).or_default();

        let mut outcome = ReadOutcome::Open;
        loop {
            match conn.read(&mut self.read_buf) {
                Ok(0) => {
                    debug!("Client {} closed the connection", id);
                    outcome = ReadOutcome::Closed;
                    break;
                }
                Ok(n) => inbound.extend(&self.read_buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Error in read for client {} ({}): {}", id, conn.addr(), e);
                    outcome = ReadOutcome::Closed;
                    break;
                }
            }
        }

        // A single read may carry several messages; submit all of them before
        // going back to the wait.
        while let Some(frame) = inbound.next_frame() {
            let task = Task {
                connection_id: id,
                frame,
            };
            if let Err(e) = self.pool.submit(task) {
                error!("Failed to submit message from client {}: {}", id, e);
            }
        }
        if inbound.pending() > 0 {
            debug!("Client {}: {} bytes waiting for a delimiter", id, inbound.pending());
        }
        outcome
    }

    fn teardown(&mut self, id: ConnectionId) {
        self.registry.unregister(id);
        self.inbound.remove(&id);
    }

    /// Drops buffers of connections closed from other threads.
    fn prune_buffers(&mut self) {
        if self.inbound.len() > self.registry.len() {
            let registry = &self.registry;
            self.inbound.retain(|id, _| registry.contains(*id));
        }
    }
}

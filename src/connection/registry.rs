// src/connection/registry.rs

//! The connection registry: the single source of truth for which connections
//! are alive.
//!
//! The registry also owns the multiplexer handle used for client sockets, so
//! that adding a connection to the watch set and to the map (or removing it
//! from both) happens under one lock. Critical sections are O(1) map
//! operations plus the matching `epoll_ctl`; socket shutdown happens after the
//! lock is released.

use super::conn::{Connection, ConnectionId};
use crate::core::CurrencyDbError;
use crate::core::metrics;
use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
    poll_registry: Registry,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Creates a registry that registers client sockets with `poll_registry`.
    pub fn new(poll_registry: Registry) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            poll_registry,
            // Token 0 belongs to the listener.
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh connection identity.
    pub fn next_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The multiplexer token for a connection.
    pub fn token(id: ConnectionId) -> Token {
        Token(id as usize)
    }

    /// Adds `conn` to the watch set and to the map.
    pub fn register(&self, conn: Connection) -> Result<Arc<Connection>, CurrencyDbError> {
        let id = conn.id();
        let fd = conn.stream().as_raw_fd();
        let conn = Arc::new(conn);

        let mut connections = self.connections.lock();
        if connections.contains_key(&id) {
            return Err(CurrencyDbError::Internal(format!(
                "connection id {id} is already registered"
            )));
        }
        self.poll_registry
            .register(&mut SourceFd(&fd), Self::token(id), Interest::READABLE)?;
        connections.insert(id, conn.clone());
        drop(connections);

        metrics::CONNECTED_CLIENTS.inc();
        Ok(conn)
    }

    /// Tears a connection down: removes it from the watch set and the map,
    /// then shuts its socket down.
    ///
    /// Idempotent. The reactor, a worker and the operator console may all race
    /// to close the same connection; only the first call does anything.
    pub fn unregister(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let removed = {
            let mut connections = self.connections.lock();
            let removed = connections.remove(&id)?;
            let fd = removed.stream().as_raw_fd();
            if let Err(e) = self.poll_registry.deregister(&mut SourceFd(&fd)) {
                debug!("Deregistering connection {} failed: {}", id, e);
            }
            removed
        };

        removed.close();
        metrics::CONNECTED_CLIENTS.dec();
        info!("Client {} ({}) disconnected", id, removed.addr());
        Some(removed)
    }

    /// Looks a connection up. `None` means it is gone.
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().contains_key(&id)
    }

    /// All live connections as `(id, peer address)`, ordered by id.
    pub fn list(&self) -> Vec<(ConnectionId, SocketAddr)> {
        let mut clients: Vec<_> = self
            .connections
            .lock()
            .values()
            .map(|conn| (conn.id(), conn.addr()))
            .collect();
        clients.sort_unstable_by_key(|(id, _)| *id);
        clients
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Tears down every connection. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let ids: Vec<ConnectionId> = self.connections.lock().keys().copied().collect();
        ids.into_iter()
            .filter(|id| self.unregister(*id).is_some())
            .count()
    }
}

// src/server/handle.rs

//! The running server: listener, reactor thread, worker pool and connection
//! registry, plus the operations the console and tests use to inspect and
//! control them.

use super::errors::StartupError;
use super::reactor::{LISTENER, Reactor, ReactorSettings, WAKER};
use crate::config::Config;
use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::core::handler::Dispatcher;
use crate::core::state::{StatsSnapshot, StatsState};
use crate::core::storage::LedgerStore;
use crate::core::workers::WorkerPool;
use mio::net::TcpListener;
use mio::{Interest, Poll, Waker};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

pub struct Server {
    registry: Arc<ConnectionRegistry>,
    pool: Arc<WorkerPool>,
    stats: Arc<StatsState>,
    terminate: Arc<AtomicBool>,
    waker: Waker,
    reactor_thread: Mutex<Option<JoinHandle<()>>>,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the listener, starts the worker pool and spawns the reactor
    /// thread. Returns once the server is accepting connections.
    pub fn start(config: &Config, store: Arc<dyn LedgerStore>) -> Result<Self, StartupError> {
        let mut listener = create_listener(&config.listen_addr())?;
        let local_addr = listener.local_addr().map_err(StartupError::Poll)?;

        let poll = Poll::new().map_err(StartupError::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(StartupError::Poll)?;
        let waker = Waker::new(poll.registry(), WAKER).map_err(StartupError::Poll)?;
        let client_registry = poll.registry().try_clone().map_err(StartupError::Poll)?;

        let registry = Arc::new(ConnectionRegistry::new(client_registry));
        let stats = Arc::new(StatsState::new());
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            store,
            stats.clone(),
            config.reactor.write_timeout(),
        ));
        let pool = Arc::new(WorkerPool::new(
            config.workers.threads,
            config.workers.ordering,
            dispatcher,
        )?);

        let terminate = Arc::new(AtomicBool::new(false));
        let reactor = Reactor::new(
            poll,
            listener,
            registry.clone(),
            pool.clone(),
            stats.clone(),
            terminate.clone(),
            ReactorSettings {
                poll_timeout: config.reactor.poll_timeout(),
                max_events: config.reactor.max_events,
                read_buffer_size: config.reactor.read_buffer_size,
                max_clients: config.max_clients,
            },
        );
        let reactor_thread = thread::Builder::new()
            .name("currencydb-reactor".to_string())
            .spawn(move || reactor.run())
            .map_err(|e| {
                pool.shutdown();
                StartupError::Threads(format!("reactor thread: {e}"))
            })?;

        info!("CurrencyDB server listening on {}", local_addr);
        Ok(Self {
            registry,
            pool,
            stats,
            terminate,
            waker,
            reactor_thread: Mutex::new(Some(reactor_thread)),
            local_addr,
        })
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// False once `stop` was called or the reactor gave up.
    pub fn is_active(&self) -> bool {
        !self.terminate.load(Ordering::Acquire)
    }

    /// Live connections as `(id, peer address)`, ordered by id.
    pub fn clients(&self) -> Vec<(ConnectionId, SocketAddr)> {
        self.registry.list()
    }

    /// Operator-readable listing of every live connection.
    pub fn list_clients(&self) -> String {
        let mut out = String::from("Clients connected:");
        for (id, addr) in self.registry.list() {
            let _ = write!(out, "\nid: {id} {addr}");
        }
        out
    }

    /// Closes one connection. Returns false if it did not exist.
    pub fn close_client(&self, id: ConnectionId) -> bool {
        self.registry.unregister(id).is_some()
    }

    /// Closes every live connection. Returns how many were closed.
    pub fn close_all_clients(&self) -> usize {
        self.registry.close_all()
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Tasks queued or running on the worker pool.
    pub fn pending_tasks(&self) -> usize {
        self.pool.in_flight()
    }

    /// Stops the reactor, drains the worker pool and closes every connection.
    /// Safe to call more than once.
    pub fn stop(&self) {
        let Some(handle) = self.reactor_thread.lock().take() else {
            return;
        };
        info!("Stopping server on {}", self.local_addr);
        self.terminate.store(true, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            warn!("Failed to wake the reactor: {}. Waiting for the poll timeout.", e);
        }
        if handle.join().is_err() {
            error!("Reactor thread panicked");
        }

        // Queued tasks still get to answer before their connections go away.
        self.pool.shutdown();
        let closed = self.registry.close_all();
        info!("Server stopped. {} client connections closed.", closed);
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Binds a non-blocking listener on `addr`.
fn create_listener(addr: &str) -> Result<TcpListener, StartupError> {
    let std_listener = std::net::TcpListener::bind(addr).map_err(|e| StartupError::Bind {
        addr: addr.to_string(),
        source: e,
    })?;
    std_listener
        .set_nonblocking(true)
        .map_err(StartupError::NonBlocking)?;
    Ok(TcpListener::from_std(std_listener))
}

// src/core/workers.rs

//! A fixed pool of worker threads that run message-processing tasks off the
//! reactor thread.
//!
//! Submission never blocks: each queue is an unbounded channel. Two ordering
//! modes are available:
//!
//! - [`TaskOrdering::PerConnection`] binds every connection to one worker
//!   queue, so messages from one peer are processed strictly in arrival order
//!   while different peers still run in parallel.
//! - [`TaskOrdering::Unordered`] uses a single queue shared by all workers.
//!   Any free worker takes the next task, so two messages from the same peer
//!   may finish out of order.

use crate::connection::ConnectionId;
use crate::core::CurrencyDbError;
use crate::core::metrics;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, error, info};

/// One unit of work: a complete frame read from a connection.
#[derive(Debug, Clone)]
pub struct Task {
    pub connection_id: ConnectionId,
    pub frame: Bytes,
}

/// Runs tasks on a worker thread.
pub trait TaskHandler: Send + Sync + 'static {
    fn handle(&self, task: Task);
}

/// How tasks from the same connection are scheduled relative to each other.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskOrdering {
    #[default]
    PerConnection,
    Unordered,
}

pub struct WorkerPool {
    senders: Mutex<Vec<UnboundedSender<Task>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    ordering: TaskOrdering,
    threads: usize,
    in_flight: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawns `threads` workers that pass every task to `handler`.
    pub fn new(
        threads: usize,
        ordering: TaskOrdering,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<Self, CurrencyDbError> {
        if threads == 0 {
            return Err(CurrencyDbError::InvalidArgument(
                "worker pool needs at least one thread".to_string(),
            ));
        }

        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut senders = Vec::new();
        let mut handles = Vec::with_capacity(threads);

        match ordering {
            TaskOrdering::PerConnection => {
                for index in 0..threads {
                    let (tx, rx) = unbounded_channel();
                    senders.push(tx);
                    let queue = WorkerQueue::Owned(rx);
                    handles.push(spawn_worker(index, queue, handler.clone(), in_flight.clone())?);
                }
            }
            TaskOrdering::Unordered => {
                let (tx, rx) = unbounded_channel();
                senders.push(tx);
                let shared = Arc::new(Mutex::new(rx));
                for index in 0..threads {
                    let queue = WorkerQueue::Shared(shared.clone());
                    handles.push(spawn_worker(index, queue, handler.clone(), in_flight.clone())?);
                }
            }
        }

        info!("Worker pool started with {} threads ({:?}).", threads, ordering);
        Ok(Self {
            senders: Mutex::new(senders),
            handles: Mutex::new(handles),
            ordering,
            threads,
            in_flight,
        })
    }

    /// Enqueues a task. Never blocks.
    pub fn submit(&self, task: Task) -> Result<(), CurrencyDbError> {
        let senders = self.senders.lock();
        if senders.is_empty() {
            return Err(CurrencyDbError::Internal(
                "worker pool is shut down".to_string(),
            ));
        }
        let index = match self.ordering {
            TaskOrdering::PerConnection => (task.connection_id % senders.len() as u64) as usize,
            TaskOrdering::Unordered => 0,
        };

        self.in_flight.fetch_add(1, Ordering::AcqRel);
        metrics::WORKER_QUEUE_DEPTH.inc();
        senders[index].send(task).map_err(|_| {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
            metrics::WORKER_QUEUE_DEPTH.dec();
            CurrencyDbError::Internal("worker queue is closed".to_string())
        })
    }

    /// Tasks submitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn ordering(&self) -> TaskOrdering {
        self.ordering
    }

    /// Closes the queues and joins every worker after the queued tasks have
    /// been drained. Later submissions fail. Safe to call more than once.
    pub fn shutdown(&self) {
        let senders = std::mem::take(&mut *self.senders.lock());
        if senders.is_empty() {
            return;
        }
        drop(senders);

        let handles = std::mem::take(&mut *self.handles.lock());
        info!(
            "Draining worker pool ({} tasks in flight)...",
            self.in_flight()
        );
        for handle in handles {
            if handle.join().is_err() {
                error!("A worker thread panicked during shutdown.");
            }
        }
        info!("Worker pool stopped.");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

enum WorkerQueue {
    Owned(UnboundedReceiver<Task>),
    Shared(Arc<Mutex<UnboundedReceiver<Task>>>),
}

impl WorkerQueue {
    /// Blocks until the next task arrives. `None` once the queue is closed and empty.
    fn next(&mut self) -> Option<Task> {
        match self {
            WorkerQueue::Owned(rx) => rx.blocking_recv(),
            WorkerQueue::Shared(rx) => rx.lock().blocking_recv(),
        }
    }
}

fn spawn_worker(
    index: usize,
    mut queue: WorkerQueue,
    handler: Arc<dyn TaskHandler>,
    in_flight: Arc<AtomicUsize>,
) -> Result<JoinHandle<()>, CurrencyDbError> {
    let handle = thread::Builder::new()
        .name(format!("currencydb-worker-{index}"))
        .spawn(move || {
            debug!("Worker {} started.", index);
            while let Some(task) = queue.next() {
                let connection_id = task.connection_id;
                if catch_unwind(AssertUnwindSafe(|| handler.handle(task))).is_err() {
                    error!(
                        "Worker {} panicked while processing a message from connection {}.",
                        index, connection_id
                    );
                }
                in_flight.fetch_sub(1, Ordering::AcqRel);
                metrics::WORKER_QUEUE_DEPTH.dec();
            }
            debug!("Worker {} exiting.", index);
        })?;
    Ok(handle)
}

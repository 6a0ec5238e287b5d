// src/connection/mod.rs

//! Connection state shared between the reactor and the worker threads, and
//! the registry that owns it.

mod conn;
mod registry;

// Publicly re-export the primary types from the sub-modules.
pub use conn::{Connection, ConnectionId};
pub use registry::ConnectionRegistry;

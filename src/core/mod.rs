// src/core/mod.rs

//! The central module containing the protocol, dispatch and storage logic of
//! CurrencyDB.

pub mod errors;
pub mod handler;
pub mod metrics;
pub mod protocol;
pub mod state;
pub mod storage;
pub mod workers;

pub use errors::CurrencyDbError;
pub use protocol::Message;

// src/core/state/mod.rs

mod stats;

pub use stats::{StatsSnapshot, StatsState};

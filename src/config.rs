// src/config.rs

//! Manages server configuration: loading, defaults, and validation.

use crate::core::workers::TaskOrdering;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// Settings for the I/O reactor thread.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReactorConfig {
    /// Upper bound on a single readiness wait, so shutdown is noticed promptly.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Maximum readiness events handled per wait.
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    /// Size of the reactor's local read buffer.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// How long a worker waits for a full send buffer to drain before giving up on a response.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

impl ReactorConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: default_poll_timeout_ms(),
            max_events: default_max_events(),
            read_buffer_size: default_read_buffer_size(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

fn default_poll_timeout_ms() -> u64 {
    1000
}
fn default_max_events() -> usize {
    128
}
fn default_read_buffer_size() -> usize {
    4096
}
fn default_write_timeout_ms() -> u64 {
    1000
}

/// Settings for the message-processing worker pool.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkersConfig {
    #[serde(default = "default_worker_threads")]
    pub threads: usize,
    #[serde(default)]
    pub ordering: TaskOrdering,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            threads: default_worker_threads(),
            ordering: TaskOrdering::default(),
        }
    }
}

fn default_worker_threads() -> usize {
    4
}

/// Settings for the ledger storage backend.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StorageConfig {
    /// Path of the JSON snapshot file. Without one the ledger lives only in memory.
    #[serde(default)]
    pub path: Option<String>,
    /// Discards any existing snapshot at startup.
    #[serde(default)]
    pub reset_on_start: bool,
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    8878
}

/// A raw representation of the config file before validation.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_max_clients")]
    max_clients: usize,
    #[serde(default)]
    reactor: ReactorConfig,
    #[serde(default)]
    workers: WorkersConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    7777
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    10000
}

/// Represents the final, validated server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub max_clients: usize,
    #[serde(default)]
    pub reactor: ReactorConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            reactor: ReactorConfig::default(),
            workers: WorkersConfig::default(),
            storage: StorageConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw_config: RawConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;

        let config = Config {
            host: raw_config.host,
            port: raw_config.port,
            log_level: raw_config.log_level,
            max_clients: raw_config.max_clients,
            reactor: raw_config.reactor,
            workers: raw_config.workers,
            storage: raw_config.storage,
            metrics: raw_config.metrics,
        };

        config.validate()?;
        Ok(config)
    }

    /// The `host:port` string the listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.workers.threads == 0 {
            return Err(anyhow!("workers.threads cannot be 0"));
        }
        if self.reactor.poll_timeout_ms == 0 {
            return Err(anyhow!("reactor.poll_timeout_ms cannot be 0"));
        }
        if self.reactor.max_events == 0 {
            return Err(anyhow!("reactor.max_events cannot be 0"));
        }
        if self.reactor.read_buffer_size == 0 {
            return Err(anyhow!("reactor.read_buffer_size cannot be 0"));
        }
        if self.reactor.poll_timeout_ms > 10_000 {
            warn!(
                "reactor.poll_timeout_ms is {} ms. Shutdown relies on the waker and may be slow if it fails.",
                self.reactor.poll_timeout_ms
            );
        }

        if let Some(path) = &self.storage.path
            && path.trim().is_empty()
        {
            return Err(anyhow!("storage.path cannot be empty when set"));
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }
        Ok(())
    }
}

//! # Receiver Configuration
//!
//! Settings can come from an optional TOML file; command-line flags override
//! whatever the file sets.
//!
//! ```toml
//! loglevel = "DEBUG"
//! socket = 8300
//! bind_address = "127.0.0.1"
//! move_delay = 0.05
//! idle_sleep_ms = 10
//! ```

// src/config.rs - Single configuration file
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::worker::WorkerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_loglevel")]
    pub loglevel: String,
    /// Serve a TCP client on this port instead of the terminal.
    #[serde(default)]
    pub socket: Option<u16>,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Seconds every G0/G1 takes to complete.
    #[serde(default = "default_move_delay")]
    pub move_delay: f64,
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loglevel: default_loglevel(),
            socket: None,
            bind_address: default_bind_address(),
            move_delay: default_move_delay(),
            idle_sleep_ms: default_idle_sleep_ms(),
        }
    }
}

fn default_loglevel() -> String {
    "INFO".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

/// Longest accepted simulated move, in seconds (one day).
pub const MAX_MOVE_DELAY_SECS: f64 = 86_400.0;

fn default_move_delay() -> f64 {
    0.01
}

fn default_idle_sleep_ms() -> u64 {
    10
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log_level()?;
        if !(0.0..=MAX_MOVE_DELAY_SECS).contains(&self.move_delay) {
            return Err(ConfigError::Invalid(format!(
                "move_delay must be between 0 and {} seconds, got {}",
                MAX_MOVE_DELAY_SECS, self.move_delay
            )));
        }
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid("bind_address must not be empty".to_string()));
        }
        Ok(())
    }

    /// Accepts tracing level names plus the `WARNING`/`CRITICAL` spellings.
    pub fn log_level(&self) -> Result<tracing::Level, ConfigError> {
        match self.loglevel.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(tracing::Level::TRACE),
            "DEBUG" => Ok(tracing::Level::DEBUG),
            "INFO" => Ok(tracing::Level::INFO),
            "WARN" | "WARNING" => Ok(tracing::Level::WARN),
            "ERROR" | "CRITICAL" => Ok(tracing::Level::ERROR),
            other => Err(ConfigError::Invalid(format!("unknown log level '{}'", other))),
        }
    }

    /// Out-of-range values are clamped; `validate` reports them.
    pub fn move_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.move_delay.clamp(0.0, MAX_MOVE_DELAY_SECS))
            .unwrap_or(Duration::ZERO)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            move_delay: self.move_delay(),
            idle_sleep: self.idle_sleep(),
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address; absent means all interfaces
    #[serde(default)]
    pub host: Option<String>,
    pub port: u16,
    /// Graceful drain window on stop
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// Runtime worker threads (CPU cores if not set)
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub max_connections: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub access_log: bool,
}

pub const DEFAULT_PORT: u16 = 8082;
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 100;

#[allow(clippy::missing_const_for_fn)]
fn default_grace_period_ms() -> u64 {
    DEFAULT_GRACE_PERIOD_MS
}

#[allow(clippy::missing_const_for_fn)]
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            grace_period_ms: default_grace_period_ms(),
            workers: None,
            max_connections: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            access_log: false,
        }
    }
}

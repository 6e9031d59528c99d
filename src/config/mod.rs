// Configuration module entry point
// Loads server and logging settings from an optional file plus environment overrides

mod types;

use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

use crate::server::ServerEndpoint;

// Re-export public types
pub use types::{Config, LoggingConfig, ServerConfig, DEFAULT_GRACE_PERIOD_MS, DEFAULT_PORT};

/// Environment variable prefix, e.g. `BEANWEB__SERVER__PORT=9000`
pub const ENV_PREFIX: &str = "BEANWEB";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid server host '{host}': {source}")]
    InvalidHost {
        host: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

impl Config {
    /// Load configuration from specified file path (without extension)
    /// The file is optional; defaults and environment fill the gaps
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        let builder = with_defaults(config::Config::builder())?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load configuration from an in-memory TOML document
    pub fn from_toml(document: &str) -> Result<Self, ConfigError> {
        let builder = with_defaults(config::Config::builder())?
            .add_source(config::File::from_str(document, config::FileFormat::Toml));

        Ok(builder.build()?.try_deserialize()?)
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    builder
        .set_default("server.port", i64::from(DEFAULT_PORT))?
        .set_default("server.grace_period_ms", DEFAULT_GRACE_PERIOD_MS)?
        .set_default("logging.level", "info")?
        .set_default("logging.access_log", false)
}

impl ServerConfig {
    pub fn bind_address(&self) -> Result<Option<IpAddr>, ConfigError> {
        self.host
            .as_deref()
            .map(|host| {
                host.parse().map_err(|source| ConfigError::InvalidHost {
                    host: host.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn endpoint(&self) -> Result<ServerEndpoint, ConfigError> {
        Ok(ServerEndpoint::new(self.bind_address()?, self.port))
    }

    pub const fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.server.port, DEFAULT_PORT);
        assert_eq!(cfg.server.host, None);
        assert_eq!(cfg.server.grace_period(), Duration::from_millis(100));
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.access_log);
    }

    #[test]
    fn test_full_document() {
        let cfg = Config::from_toml(
            r#"
            [server]
            host = "127.0.0.1"
            port = 18080
            grace_period_ms = 2500
            workers = 2
            max_connections = 64

            [logging]
            level = "debug"
            access_log = true
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.port, 18080);
        assert_eq!(cfg.server.workers, Some(2));
        assert_eq!(cfg.server.max_connections, Some(64));
        assert_eq!(cfg.server.grace_period(), Duration::from_millis(2500));
        assert_eq!(
            cfg.server.endpoint().unwrap().to_string(),
            "127.0.0.1:18080"
        );
        assert!(cfg.logging.access_log);
    }

    #[test]
    fn test_absent_host_binds_everywhere() {
        let cfg = Config::from_toml("[server]\nport = 9000\n").unwrap();
        let endpoint = cfg.server.endpoint().unwrap();
        assert_eq!(endpoint.address, None);
        assert_eq!(endpoint.port, 9000);
    }

    #[test]
    fn test_invalid_host() {
        let cfg = Config::from_toml("[server]\nhost = \"not-an-ip\"\n").unwrap();
        assert!(matches!(
            cfg.server.endpoint(),
            Err(ConfigError::InvalidHost { .. })
        ));
    }

    #[test]
    fn test_environment_overrides_defaults() {
        std::env::set_var("BEANWEB__SERVER__PORT", "18099");
        std::env::set_var("BEANWEB__SERVER__GRACE_PERIOD_MS", "750");
        let cfg = Config::load_from("definitely/not/here/beanweb-env");
        std::env::remove_var("BEANWEB__SERVER__PORT");
        std::env::remove_var("BEANWEB__SERVER__GRACE_PERIOD_MS");

        let cfg = cfg.unwrap();
        assert_eq!(cfg.server.port, 18099);
        assert_eq!(cfg.server.grace_period(), Duration::from_millis(750));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let cfg = Config::load_from("definitely/not/here/beanweb").unwrap();
        assert!(cfg.server.port > 0);
    }
}

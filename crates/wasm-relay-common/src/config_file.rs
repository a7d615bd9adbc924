//! TOML configuration file for the relay binary.
//!
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`ServerConfigFile`]: HTTP server settings

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::RuntimeConfig;

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// [runtime.engine]
/// pooling_allocator = true
///
/// [runtime.execution]
/// max_fuel = 10_000_000
/// timeout_ms = 1000
///
/// [runtime.module]
/// path = "./worker.wasm"
/// entry_point = "run"
///
/// [server]
/// bind_addr = "0.0.0.0:8080"
/// request_timeout_secs = 30
/// health_path = "/__health"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Runtime configuration (engine, execution and module settings).
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfigFile,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }
}

/// HTTP server configuration from config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfigFile {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "defaults::bind_addr")]
    pub bind_addr: String,

    /// Request timeout in seconds.
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Enable graceful shutdown.
    #[serde(default = "defaults::graceful_shutdown")]
    pub graceful_shutdown: bool,

    /// Largest request body read before answering `413`.
    #[serde(default = "defaults::max_body_bytes")]
    pub max_body_bytes: usize,

    /// Path of the health endpoint.
    ///
    /// Unset by default: every path belongs to the relayed module.
    #[serde(default)]
    pub health_path: Option<String>,
}

impl Default for ServerConfigFile {
    fn default() -> Self {
        Self {
            bind_addr: defaults::bind_addr(),
            request_timeout_secs: defaults::request_timeout_secs(),
            graceful_shutdown: defaults::graceful_shutdown(),
            max_body_bytes: defaults::max_body_bytes(),
            health_path: None,
        }
    }
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}

mod defaults {
    pub fn bind_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    pub const fn request_timeout_secs() -> u64 {
        30
    }

    pub const fn graceful_shutdown() -> bool {
        true
    }

    pub const fn max_body_bytes() -> usize {
        2 * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();

        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert!(config.server.graceful_shutdown);
        assert!(config.server.health_path.is_none());
        assert_eq!(config.server.max_body_bytes, 2 * 1024 * 1024);
        assert!(config.runtime.module.path.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [runtime.module]
            path = "./worker.wasm"
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert_eq!(
            config.runtime.module.path,
            Some(PathBuf::from("./worker.wasm"))
        );
        assert_eq!(config.runtime.module.entry_point, "run");
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [runtime.engine]
            pooling_allocator = false
            max_instances = 500
            epoch_interruption = false

            [runtime.execution]
            max_fuel = 5_000_000
            timeout_ms = 50
            max_memory_mb = 16
            fuel_metering = false

            [runtime.module]
            path = "/srv/snake.wasm"
            entry_point = "handle"
            alloc_export = "malloc"
            memory_export = "mem"
            wasi = false

            [server]
            bind_addr = "127.0.0.1:9000"
            request_timeout_secs = 60
            graceful_shutdown = false
            max_body_bytes = 65536
            health_path = "/__health"
        "#;

        let config = ConfigFile::from_toml(toml).unwrap();

        assert!(!config.runtime.engine.pooling_allocator);
        assert_eq!(config.runtime.engine.max_instances, 500);
        assert!(!config.runtime.engine.epoch_interruption);
        assert_eq!(config.runtime.execution.max_fuel, 5_000_000);
        assert_eq!(config.runtime.execution.timeout_ms, 50);
        assert_eq!(config.runtime.execution.max_memory_mb, 16);
        assert!(!config.runtime.execution.fuel_metering);
        assert_eq!(config.runtime.module.entry_point, "handle");
        assert_eq!(config.runtime.module.alloc_export, "malloc");
        assert_eq!(config.runtime.module.memory_export, "mem");
        assert!(!config.runtime.module.wasi);
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.server.request_timeout_secs, 60);
        assert!(!config.server.graceful_shutdown);
        assert_eq!(config.server.max_body_bytes, 65536);
        assert_eq!(config.server.health_path.as_deref(), Some("/__health"));
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = ConfigFile::from_toml("this is not valid toml [");
        assert!(matches!(result, Err(ConfigFileError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigFile::from_file("/nonexistent/relay.toml");
        assert!(matches!(result, Err(ConfigFileError::Io { .. })));
    }
}

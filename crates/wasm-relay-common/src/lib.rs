//! Common errors and configuration for wasm-relay.
//!
//! This crate provides functionality shared across the workspace:
//! - Error types using `thiserror`
//! - Runtime configuration structures
//! - The TOML configuration file loaded by the binary

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{EngineConfig, ExecutionConfig, ModuleConfig, RuntimeConfig};
pub use config_file::{ConfigFile, ConfigFileError, ServerConfigFile};
pub use error::{RelayError, RuntimeError};

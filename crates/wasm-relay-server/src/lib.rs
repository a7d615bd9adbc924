//! HTTP server hosting the wasm-relay request relay.
//!
//! Every request, whatever its method or path, is handed to the relay and
//! answered with the module's output. This crate handles:
//!
//! - Conversion between axum requests/responses and the relay's types
//! - The generic `500` reported when a relay call fails
//! - An optional health route
//! - Advancing the engine epoch so execution deadlines fire
//!
//! # Quick Start
//!
//! ```ignore
//! use wasm_relay_server::{RelayServer, ServerConfig};
//! use wasm_relay_common::RuntimeConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut runtime_config = RuntimeConfig::default();
//!     runtime_config.module.path = Some("relay.wasm".into());
//!
//!     let server = RelayServer::new(&runtime_config, ServerConfig::default())?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod handler;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod state;

pub use server::{RelayServer, ServerConfig, TestHandle};
pub use state::{AppState, WasmRelay};

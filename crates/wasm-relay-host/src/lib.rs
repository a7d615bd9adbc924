//! Host functions for wasm-relay guest modules.
//!
//! # Interfaces
//!
//! - [`logging`]: `env.log`, guest log lines routed into `tracing`
//! - [`linker`]: registration of `env.log` and WASI preview1, and the
//!   [`create_instance_runner`] factory used by the server

pub mod linker;
pub mod logging;

pub use linker::{create_instance_runner, register_all};
pub use logging::LoggingHost;

//! Wasmtime execution and the request relay for wasm-relay.
//!
//! This crate provides:
//! - [`Relay`]: Once-guarded module initialization and request pass-through
//! - [`WasmEngine`]: Configured Wasmtime engine shared by everything
//! - [`CompiledModule`] and [`ModuleSource`]: Compiling the relay artifact
//! - [`InstanceRunner`]: Executing one call against the guest ABI in [`abi`]
//! - [`WasmModuleLoader`]: The Wasm implementation of [`ModuleInit`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Relay<WasmModuleLoader>                 │
//! │  (process-wide, OnceCell-guarded module handle)         │
//! └─────────────────────────────────────────────────────────┘
//!                            │ first request only
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │        WasmModuleHandle (CompiledModule + InstancePre)  │
//! │  (compiled and linked once, read-only afterwards)       │
//! └─────────────────────────────────────────────────────────┘
//!                            │ every request
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │            Store<WorkerContext> + Instance              │
//! │  (per request: fuel, epoch deadline, memory limit)      │
//! │  alloc(len) → write envelope → run(ptr, len) → output   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod abi;
pub mod engine;
pub mod instance;
pub mod loader;
pub mod module;
pub mod relay;
pub mod request;
pub mod store;

pub use engine::WasmEngine;
pub use instance::{GuestExports, InstanceRunner};
pub use loader::{WasmModuleHandle, WasmModuleLoader};
pub use module::{CompiledModule, ModuleSource};
pub use relay::{EntryPoint, ModuleInit, Relay, RelayFuture, RelayResponse};
pub use request::RelayRequest;
pub use store::{ExecutionMetrics, LogEntry, LogLevel, WorkerContext};

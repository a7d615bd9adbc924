//! Shared application state.
//!
//! [`AppState`] holds the process-wide relay and the engine it runs on.
//! Handlers receive a clone per request; everything inside is behind `Arc`.

use std::sync::Arc;

use wasm_relay_common::{RuntimeConfig, RuntimeError};
use wasm_relay_core::{GuestExports, ModuleSource, Relay, WasmEngine, WasmModuleLoader};
use wasm_relay_host::create_instance_runner;

/// The relay type the server hosts.
pub type WasmRelay = Relay<WasmModuleLoader>;

/// Request body limit when none is configured.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared state across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The relay; initializes its module on the first request.
    relay: Arc<WasmRelay>,

    /// Wasmtime engine, kept for the epoch ticker.
    engine: WasmEngine,

    /// Largest request body the handler reads.
    max_body_bytes: usize,
}

impl AppState {
    /// Create application state for the module at `config.module.path`.
    ///
    /// The module is not read or compiled here; that happens on the
    /// first relayed request.
    ///
    /// # Errors
    ///
    /// Returns an error if no module path is configured or the engine or
    /// linker cannot be created.
    pub fn new(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let path = config
            .module
            .path
            .clone()
            .ok_or_else(|| RuntimeError::invalid_config("module.path is not set"))?;

        Self::with_source(config, ModuleSource::File(path))
    }

    /// Create application state for an explicit module source.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine or linker cannot be created.
    pub fn with_source(config: &RuntimeConfig, source: ModuleSource) -> Result<Self, RuntimeError> {
        let engine = WasmEngine::new(&config.engine)?;
        let runner = Arc::new(create_instance_runner(engine.shared(), &config.module)?);

        let loader = WasmModuleLoader::new(
            engine.clone(),
            runner,
            source,
            GuestExports::from(&config.module),
            config.execution.clone(),
        );

        Ok(Self {
            relay: Arc::new(Relay::new(loader)),
            engine,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Set the request body limit.
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Get the relay.
    pub fn relay(&self) -> &Arc<WasmRelay> {
        &self.relay
    }

    /// Get the Wasmtime engine.
    pub fn engine(&self) -> &WasmEngine {
        &self.engine
    }

    /// Get the request body limit.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("source", &self.relay.initializer().source().describe())
            .field("initialized", &self.relay.is_initialized())
            .finish_non_exhaustive()
    }
}

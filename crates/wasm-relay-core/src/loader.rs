//! The WebAssembly implementation of the relay's module seam.
//!
//! [`WasmModuleLoader`] compiles the artifact, checks its exports and links
//! it once. The resulting [`WasmModuleHandle`] is what the relay keeps for
//! the life of the process; each call instantiates it into a fresh store.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use wasmtime::InstancePre;

use crate::instance::{GuestExports, InstanceRunner};
use crate::module::ModuleSource;
use crate::relay::{EntryPoint, ModuleInit};
use crate::store::{WorkerContext, create_store};
use crate::{RelayRequest, WasmEngine};
use wasm_relay_common::{ExecutionConfig, RuntimeError};

/// Initializes a relay module from a [`ModuleSource`].
pub struct WasmModuleLoader {
    engine: WasmEngine,
    runner: Arc<InstanceRunner>,
    source: ModuleSource,
    exports: GuestExports,
    exec_config: ExecutionConfig,
}

impl WasmModuleLoader {
    /// Create a loader.
    ///
    /// `runner` must have been created for `engine` and already carry the
    /// host functions the module imports.
    pub fn new(
        engine: WasmEngine,
        runner: Arc<InstanceRunner>,
        source: ModuleSource,
        exports: GuestExports,
        exec_config: ExecutionConfig,
    ) -> Self {
        Self {
            engine,
            runner,
            source,
            exports,
            exec_config,
        }
    }

    /// Where the module comes from.
    pub fn source(&self) -> &ModuleSource {
        &self.source
    }
}

#[async_trait]
impl ModuleInit for WasmModuleLoader {
    type Handle = WasmModuleHandle;

    #[instrument(skip(self), fields(source = %self.source.describe()))]
    async fn init(&self) -> Result<WasmModuleHandle, RuntimeError> {
        let start = Instant::now();

        let module = self.source.compile(self.engine.inner()).await?;
        self.exports.verify(&module)?;
        let pre = self.runner.prepare(&module)?;

        info!(
            content_hash = %module.content_hash(),
            duration_ms = start.elapsed().as_millis(),
            "Module initialized"
        );

        Ok(WasmModuleHandle {
            engine: self.engine.clone(),
            runner: Arc::clone(&self.runner),
            pre,
            exports: self.exports.clone(),
            exec_config: self.exec_config.clone(),
            content_hash: module.content_hash().to_string(),
        })
    }
}

/// An initialized relay module.
pub struct WasmModuleHandle {
    engine: WasmEngine,
    runner: Arc<InstanceRunner>,
    pre: InstancePre<WorkerContext>,
    exports: GuestExports,
    exec_config: ExecutionConfig,
    content_hash: String,
}

impl WasmModuleHandle {
    /// Content hash of the module's source.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

#[async_trait]
impl EntryPoint for WasmModuleHandle {
    async fn run(&self, request: RelayRequest) -> Result<String, RuntimeError> {
        let request_id = Uuid::new_v4().to_string();
        let input = request.to_envelope()?;

        debug!(
            request_id = %request_id,
            method = %request.method,
            url = %request.url,
            "Relaying request to module"
        );

        let mut store = create_store(&self.engine, &self.exec_config, request_id)?;

        self.runner
            .invoke(
                &self.pre,
                &mut store,
                &self.exports,
                &self.exec_config,
                &input,
            )
            .await
    }
}

impl std::fmt::Debug for WasmModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmModuleHandle")
            .field("content_hash", &self.content_hash)
            .field("exports", &self.exports)
            .finish_non_exhaustive()
    }
}

//! WebAssembly instance lifecycle management.
//!
//! [`InstanceRunner`] owns the linker with the host functions and executes
//! one relay call:
//!
//! 1. Link the module once into an [`InstancePre`]
//! 2. Instantiate it into a fresh per-request store
//! 3. Copy the request into guest memory and call the entry point
//! 4. Read the output string back and record metrics

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use wasmtime::{Engine, Error, InstancePre, Linker, Store, Trap};

use crate::abi;
use crate::module::{CompiledModule, ValKind};
use crate::store::{WorkerContext, calculate_fuel_consumed, get_remaining_fuel};
use wasm_relay_common::{ExecutionConfig, ModuleConfig, RuntimeError};

/// Names of the exports a relay call uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestExports {
    /// Entry point, `(i32, i32) -> i64`.
    pub entry_point: String,
    /// Allocator, `(i32) -> i32`.
    pub alloc: String,
    /// Linear memory.
    pub memory: String,
}

impl Default for GuestExports {
    fn default() -> Self {
        Self::from(&ModuleConfig::default())
    }
}

impl From<&ModuleConfig> for GuestExports {
    fn from(config: &ModuleConfig) -> Self {
        Self {
            entry_point: config.entry_point.clone(),
            alloc: config.alloc_export.clone(),
            memory: config.memory_export.clone(),
        }
    }
}

impl GuestExports {
    /// Check the module exports everything a relay call needs.
    pub fn verify(&self, module: &CompiledModule) -> Result<(), RuntimeError> {
        module.require_memory(&self.memory)?;
        module.require_function(&self.alloc, &[ValKind::I32], &[ValKind::I32])?;
        module.require_function(
            &self.entry_point,
            &[ValKind::I32, ValKind::I32],
            &[ValKind::I64],
        )
    }
}

/// Instance lifecycle manager.
///
/// Thread-safe: the linker is only read after host functions are
/// registered, and every execution uses its own [`Store`].
pub struct InstanceRunner {
    engine: Arc<Engine>,
    linker: Linker<WorkerContext>,
}

impl InstanceRunner {
    /// Create a new instance runner with an empty linker.
    pub fn new(engine: Arc<Engine>) -> Self {
        let linker = Linker::new(&engine);
        Self { engine, linker }
    }

    /// Get a mutable reference to the linker.
    ///
    /// Use this to register host functions before preparing modules.
    pub fn linker_mut(&mut self) -> &mut Linker<WorkerContext> {
        &mut self.linker
    }

    /// Resolve the module's imports once.
    ///
    /// # Errors
    ///
    /// Returns an error if the module imports something the linker does
    /// not provide.
    pub fn prepare(
        &self,
        module: &CompiledModule,
    ) -> Result<InstancePre<WorkerContext>, RuntimeError> {
        self.linker
            .instantiate_pre(module.as_module())
            .map_err(|e| RuntimeError::instantiation_failed(format!("Linking failed: {e}")))
    }

    /// Execute one relay call.
    ///
    /// # Errors
    ///
    /// Returns an error if instantiation fails, an export is missing, the
    /// guest traps or runs out of fuel or time, or the guest breaks the
    /// memory protocol.
    #[instrument(skip_all, fields(request_id = %store.data().request_id, entry_point = %exports.entry_point))]
    pub async fn invoke(
        &self,
        pre: &InstancePre<WorkerContext>,
        store: &mut Store<WorkerContext>,
        exports: &GuestExports,
        exec_config: &ExecutionConfig,
        input: &[u8],
    ) -> Result<String, RuntimeError> {
        let start = Instant::now();
        let initial_fuel = get_remaining_fuel(store).unwrap_or(0);

        let result = self.call(pre, store, exports, exec_config, input).await;

        let fuel_consumed = calculate_fuel_consumed(initial_fuel, store);
        store.data_mut().metrics.fuel_consumed = fuel_consumed;
        store.data_mut().finalize_metrics();

        let duration = start.elapsed();

        match &result {
            Ok(output) => info!(
                duration_ms = duration.as_millis(),
                fuel_consumed = fuel_consumed,
                output_bytes = output.len(),
                "Execution completed successfully"
            ),
            Err(e) => warn!(
                duration_ms = duration.as_millis(),
                fuel_consumed = fuel_consumed,
                error = %e,
                "Execution failed"
            ),
        }

        result
    }

    async fn call(
        &self,
        pre: &InstancePre<WorkerContext>,
        store: &mut Store<WorkerContext>,
        exports: &GuestExports,
        exec_config: &ExecutionConfig,
        input: &[u8],
    ) -> Result<String, RuntimeError> {
        debug!("Instantiating module");

        let instance = pre
            .instantiate_async(&mut *store)
            .await
            .map_err(|e| classify(e, exec_config))?;

        let memory = instance
            .get_memory(&mut *store, &exports.memory)
            .ok_or_else(|| RuntimeError::missing_export(&exports.memory, "memory"))?;
        let alloc = instance
            .get_typed_func::<i32, i32>(&mut *store, &exports.alloc)
            .map_err(|_| RuntimeError::missing_export(&exports.alloc, "function (i32) -> i32"))?;
        let run = instance
            .get_typed_func::<(i32, i32), i64>(&mut *store, &exports.entry_point)
            .map_err(|_| {
                RuntimeError::missing_export(&exports.entry_point, "function (i32, i32) -> i64")
            })?;

        let len = abi::input_len(input)?;
        let ptr = alloc
            .call_async(&mut *store, len)
            .await
            .map_err(|e| classify(e, exec_config))?;
        abi::write_input(&memory, &mut *store, ptr, input)?;
        store.data_mut().metrics.input_bytes = input.len();

        debug!(ptr, len, "Request written, calling entry point");

        let packed = run
            .call_async(&mut *store, (ptr, len))
            .await
            .map_err(|e| classify(e, exec_config))?;

        let (out_ptr, out_len) = abi::unpack(packed);
        let output = abi::read_output(&memory, &*store, out_ptr, out_len)?;
        store.data_mut().metrics.output_bytes = output.len();

        Ok(output)
    }

    /// Get the engine reference.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

/// Map a Wasmtime error to the runtime error it stands for.
fn classify(error: Error, exec_config: &ExecutionConfig) -> RuntimeError {
    match error.downcast_ref::<Trap>() {
        Some(Trap::OutOfFuel) => RuntimeError::FuelExhausted,
        Some(Trap::Interrupt) => RuntimeError::ExecutionTimeout {
            duration_ms: exec_config.timeout_ms,
        },
        Some(trap) => RuntimeError::trap(format!("{trap}: {error}")),
        None => RuntimeError::trap(error.to_string()),
    }
}

impl std::fmt::Debug for InstanceRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRunner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_fuel() {
        let err = classify(Error::new(Trap::OutOfFuel), &ExecutionConfig::default());
        assert!(matches!(err, RuntimeError::FuelExhausted));
    }

    #[test]
    fn test_classify_interrupt() {
        let config = ExecutionConfig {
            timeout_ms: 250,
            ..Default::default()
        };
        let err = classify(Error::new(Trap::Interrupt), &config);
        assert!(matches!(
            err,
            RuntimeError::ExecutionTimeout { duration_ms: 250 }
        ));
    }

    #[test]
    fn test_classify_other_trap() {
        let err = classify(
            Error::new(Trap::UnreachableCodeReached),
            &ExecutionConfig::default(),
        );
        assert!(matches!(err, RuntimeError::Trap { .. }));

        let err = classify(Error::msg("host failure"), &ExecutionConfig::default());
        assert_eq!(err.to_string(), "Wasm trap: host failure");
    }

    #[test]
    fn test_guest_exports_from_config() {
        let config = ModuleConfig {
            entry_point: "handle".into(),
            ..Default::default()
        };
        let exports = GuestExports::from(&config);

        assert_eq!(exports.entry_point, "handle");
        assert_eq!(exports.alloc, "alloc");
        assert_eq!(exports.memory, "memory");
        assert_eq!(GuestExports::default().entry_point, "run");
    }
}

//! Host function registration for Wasmtime linkers.

use std::sync::Arc;

use tracing::{debug, warn};
use wasmtime::{Caller, Engine, Linker};

use wasm_relay_common::{ModuleConfig, RuntimeError};
use wasm_relay_core::InstanceRunner;
use wasm_relay_core::store::WorkerContext;

use crate::logging::{LoggingHost, level_from_i32};

/// Create an [`InstanceRunner`] with every host function the module may import.
pub fn create_instance_runner(
    engine: Arc<Engine>,
    module: &ModuleConfig,
) -> Result<InstanceRunner, RuntimeError> {
    let mut runner = InstanceRunner::new(engine);
    register_all(runner.linker_mut(), module)?;
    Ok(runner)
}

/// Register all host functions on a linker.
///
/// - `env::log` always
/// - `wasi_snapshot_preview1::*` when `module.wasi` is set
pub fn register_all(
    linker: &mut Linker<WorkerContext>,
    module: &ModuleConfig,
) -> Result<(), RuntimeError> {
    register_logging(linker, &module.memory_export)?;
    if module.wasi {
        register_wasi(linker)?;
    }
    Ok(())
}

/// Link WASI preview1 for `wasm32-wasip1` guests.
pub fn register_wasi(linker: &mut Linker<WorkerContext>) -> Result<(), RuntimeError> {
    wasmtime_wasi::preview1::add_to_linker_async(linker, WorkerContext::wasi_mut).map_err(|e| {
        RuntimeError::invalid_config(format!("Failed to link WASI preview1: {e}"))
    })?;
    debug!("WASI preview1 linked");
    Ok(())
}

/// Register the logging host function.
///
/// `env::log(level: i32, ptr: i32, len: i32)` reads `len` UTF-8 bytes at
/// `ptr` from the guest memory exported as `memory_export`. Calls with bad
/// arguments are dropped with a warning; they never trap the guest.
pub fn register_logging(
    linker: &mut Linker<WorkerContext>,
    memory_export: &str,
) -> Result<(), RuntimeError> {
    let memory_export = memory_export.to_string();
    linker
        .func_wrap(
            "env",
            "log",
            move |mut caller: Caller<'_, WorkerContext>, level: i32, ptr: i32, len: i32| {
                let (Ok(start), Ok(len)) = (usize::try_from(ptr), usize::try_from(len)) else {
                    warn!(ptr, len, "Invalid pointer or length (negative value)");
                    return;
                };

                let Some(memory) = caller
                    .get_export(&memory_export)
                    .and_then(wasmtime::Extern::into_memory)
                else {
                    warn!(export = %memory_export, "Memory export not found in guest module");
                    return;
                };

                // Copied out so the borrow of guest memory ends before
                // `caller.data_mut()`.
                let message = {
                    let data = memory.data(&caller);
                    let Some(bytes) = start
                        .checked_add(len)
                        .and_then(|end| data.get(start..end))
                    else {
                        warn!(
                            start,
                            len,
                            memory_size = data.len(),
                            "Memory access out of bounds"
                        );
                        return;
                    };

                    String::from_utf8_lossy(bytes).into_owned()
                };

                LoggingHost::log(caller.data_mut(), level_from_i32(level), &message);
            },
        )
        .map_err(|e| {
            RuntimeError::invalid_config(format!("Failed to register log function: {e}"))
        })?;

    Ok(())
}

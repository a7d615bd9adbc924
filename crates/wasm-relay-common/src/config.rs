//! Configuration structures for wasm-relay.
//!
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Wasmtime engine settings (pooling, epochs)
//! - [`ExecutionConfig`]: Per-request execution limits (fuel, memory, timeout)
//! - [`ModuleConfig`]: Which module to relay to and the names of its exports

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Wasmtime engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-request execution configuration.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// The relayed module.
    #[serde(default)]
    pub module: ModuleConfig,
}

/// Wasmtime engine configuration.
///
/// These settings are global to the process: one engine is shared by the
/// module handle and every request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable pooling allocator for fast per-request instantiation.
    #[serde(default = "defaults::pooling_allocator")]
    pub pooling_allocator: bool,

    /// Maximum concurrent instances in the pool.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::max_instances")]
    pub max_instances: u32,

    /// Memory per instance slot in megabytes.
    #[serde(default = "defaults::instance_memory_mb")]
    pub instance_memory_mb: u32,

    /// Enable epoch-based interruption.
    ///
    /// Needs a ticker incrementing the engine epoch once per millisecond;
    /// the server runs one.
    #[serde(default = "defaults::epoch_interruption")]
    pub epoch_interruption: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pooling_allocator: defaults::pooling_allocator(),
            max_instances: defaults::max_instances(),
            instance_memory_mb: defaults::instance_memory_mb(),
            epoch_interruption: defaults::epoch_interruption(),
        }
    }
}

/// Per-request execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Maximum fuel (CPU instructions) per request.
    #[serde(default = "defaults::max_fuel")]
    pub max_fuel: u64,

    /// Execution timeout in milliseconds (epoch ticks).
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum linear memory in megabytes.
    #[serde(default = "defaults::max_memory_mb")]
    pub max_memory_mb: u32,

    /// Enable fuel metering.
    ///
    /// When disabled the store still runs with fuel accounting, but with an
    /// unbounded budget.
    #[serde(default = "defaults::fuel_metering")]
    pub fuel_metering: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_fuel: defaults::max_fuel(),
            timeout_ms: defaults::timeout_ms(),
            max_memory_mb: defaults::max_memory_mb(),
            fuel_metering: defaults::fuel_metering(),
        }
    }
}

impl ExecutionConfig {
    /// Get the memory limit in bytes.
    pub fn max_memory_bytes(&self) -> usize {
        (self.max_memory_mb as usize) * 1024 * 1024
    }
}

/// The relayed module and its export names.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleConfig {
    /// Path to the `.wasm` (or `.wat`) file.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Exported entry point, `(i32, i32) -> i64`.
    #[serde(default = "defaults::entry_point")]
    pub entry_point: String,

    /// Exported allocator, `(i32) -> i32`.
    #[serde(default = "defaults::alloc_export")]
    pub alloc_export: String,

    /// Exported linear memory.
    #[serde(default = "defaults::memory_export")]
    pub memory_export: String,

    /// Link WASI preview1 imports for `wasm32-wasip1` guests.
    #[serde(default = "defaults::wasi")]
    pub wasi: bool,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            path: None,
            entry_point: defaults::entry_point(),
            alloc_export: defaults::alloc_export(),
            memory_export: defaults::memory_export(),
            wasi: defaults::wasi(),
        }
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn pooling_allocator() -> bool {
        true
    }

    pub const fn max_instances() -> u32 {
        1000
    }

    pub const fn instance_memory_mb() -> u32 {
        64
    }

    pub const fn epoch_interruption() -> bool {
        true
    }

    pub const fn max_fuel() -> u64 {
        10_000_000
    }

    pub const fn timeout_ms() -> u64 {
        1000
    }

    pub const fn max_memory_mb() -> u32 {
        64
    }

    pub const fn fuel_metering() -> bool {
        true
    }

    pub fn entry_point() -> String {
        "run".to_string()
    }

    pub fn alloc_export() -> String {
        "alloc".to_string()
    }

    pub fn memory_export() -> String {
        "memory".to_string()
    }

    pub const fn wasi() -> bool {
        true
    }
}

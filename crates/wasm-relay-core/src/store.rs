//! Per-request execution context and store management.
//!
//! This module provides:
//! - [`WorkerContext`]: Per-request state accessible from host functions
//! - [`LogEntry`] and [`LogLevel`]: Structured logging from guest code
//! - [`ExecutionMetrics`]: Performance metrics for each execution

use std::time::{Duration, Instant};

use wasmtime::{Store, StoreLimits, StoreLimitsBuilder};
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::preview1::WasiP1Ctx;

use crate::WasmEngine;
use wasm_relay_common::{ExecutionConfig, RuntimeError};

/// Most log entries kept per request.
pub const MAX_LOG_ENTRIES: usize = 1024;

/// Most log message bytes kept per request.
pub const MAX_LOG_BYTES: usize = 64 * 1024;

/// Per-request execution context.
///
/// Every relayed request gets its own [`Store`] holding one of these, so
/// nothing a guest does in one request is visible to another.
pub struct WorkerContext {
    /// WASI preview1 context for `wasm32-wasip1` guests.
    wasi: WasiP1Ctx,

    /// Memory and instance limits enforced by the store.
    limits: StoreLimits,

    /// Unique request identifier for tracing.
    pub request_id: String,

    /// Logs collected from guest code, up to [`MAX_LOG_ENTRIES`] and
    /// [`MAX_LOG_BYTES`].
    pub logs: Vec<LogEntry>,

    /// Log entries refused once a cap was reached.
    pub dropped_logs: usize,

    log_bytes: usize,

    /// Execution metrics.
    pub metrics: ExecutionMetrics,

    start_time: Instant,
}

/// A single log entry from guest code.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level (debug, info, warn, error).
    pub level: LogLevel,

    /// Log message content.
    pub message: String,

    /// Timestamp when the log was recorded.
    pub timestamp: Instant,
}

/// Log level for guest logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Execution performance metrics.
#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    /// Fuel consumed during execution.
    pub fuel_consumed: u64,

    /// Bytes of request envelope written into guest memory.
    pub input_bytes: usize,

    /// Bytes of output read back from guest memory.
    pub output_bytes: usize,

    /// Total execution duration.
    pub duration: Option<Duration>,
}

impl WorkerContext {
    /// Create a new worker context without memory limits.
    pub fn new(request_id: String) -> Self {
        Self::with_limits(request_id, StoreLimits::default())
    }

    /// Create a new worker context with the given store limits.
    pub fn with_limits(request_id: String, limits: StoreLimits) -> Self {
        // Guests may print for debugging; nothing else is granted.
        let wasi = WasiCtxBuilder::new()
            .inherit_stdout()
            .inherit_stderr()
            .build_p1();

        Self {
            wasi,
            limits,
            request_id,
            logs: Vec::new(),
            dropped_logs: 0,
            log_bytes: 0,
            metrics: ExecutionMetrics::default(),
            start_time: Instant::now(),
        }
    }

    /// Add a log entry.
    ///
    /// Returns `false` and counts the entry in `dropped_logs` when it would
    /// exceed either per-request cap.
    pub fn log(&mut self, level: LogLevel, message: String) -> bool {
        let bytes = self.log_bytes + message.len();
        if self.logs.len() >= MAX_LOG_ENTRIES || bytes > MAX_LOG_BYTES {
            self.dropped_logs += 1;
            return false;
        }

        self.log_bytes = bytes;
        self.logs.push(LogEntry {
            level,
            message,
            timestamp: Instant::now(),
        });
        true
    }

    /// Get the WASI preview1 context.
    pub fn wasi_mut(&mut self) -> &mut WasiP1Ctx {
        &mut self.wasi
    }

    /// Get elapsed time since execution started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Finalize metrics after execution.
    pub fn finalize_metrics(&mut self) {
        self.metrics.duration = Some(self.start_time.elapsed());
    }
}

/// Create a new Wasmtime store for one request.
///
/// - fuel: `max_fuel` when metering is on, unbounded otherwise (the engine
///   always consumes fuel)
/// - epoch deadline: `timeout_ms` ticks when epoch interruption is on
/// - memory: capped at `max_memory_mb`
///
/// # Errors
///
/// Returns an error if fuel cannot be set on the store.
pub fn create_store(
    engine: &WasmEngine,
    config: &ExecutionConfig,
    request_id: String,
) -> Result<Store<WorkerContext>, RuntimeError> {
    let limits = StoreLimitsBuilder::new()
        .memory_size(config.max_memory_bytes())
        .build();
    let context = WorkerContext::with_limits(request_id, limits);
    let mut store = Store::new(engine.inner(), context);

    store.limiter(|ctx| &mut ctx.limits);

    let fuel = if config.fuel_metering {
        config.max_fuel
    } else {
        u64::MAX
    };
    store
        .set_fuel(fuel)
        .map_err(|e| RuntimeError::invalid_config(format!("Failed to set fuel: {e}")))?;

    if engine.is_epoch_enabled() {
        store.set_epoch_deadline(config.timeout_ms);
    }

    Ok(store)
}

/// Get remaining fuel from a store.
pub fn get_remaining_fuel(store: &Store<WorkerContext>) -> Option<u64> {
    store.get_fuel().ok()
}

/// Calculate fuel consumed.
pub fn calculate_fuel_consumed(initial_fuel: u64, store: &Store<WorkerContext>) -> u64 {
    let remaining = get_remaining_fuel(store).unwrap_or(0);
    initial_fuel.saturating_sub(remaining)
}

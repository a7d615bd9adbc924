//! Error types for wasm-relay.
//!
//! This module defines the error hierarchy using `thiserror`:
//! - [`RuntimeError`]: Failures while compiling, linking or running a guest module
//! - [`RelayError`]: Which relay step a [`RuntimeError`] escaped from

use std::io;

use thiserror::Error;

/// Errors raised by the WebAssembly runtime.
///
/// These cover the lifecycle of a relay module, from reading its bytes
/// to reading the string its entry point returns.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// WebAssembly compilation failed.
    #[error("Compilation failed: {reason}")]
    CompilationFailed {
        /// Description of the compilation failure.
        reason: String,
    },

    /// Linking or instantiating the module failed.
    #[error("Instantiation failed: {reason}")]
    InstantiationFailed {
        /// Description of the instantiation failure.
        reason: String,
    },

    /// The module does not export something the relay calls.
    #[error("Missing export '{name}': {expected}")]
    MissingExport {
        /// Name of the export.
        name: String,
        /// What kind of export was expected.
        expected: String,
    },

    /// The guest broke the memory protocol (bad pointer, bad length, bad UTF-8).
    #[error("Guest ABI violation: {reason}")]
    GuestAbi {
        /// Description of the violation.
        reason: String,
    },

    /// Execution exceeded the configured timeout.
    #[error("Execution timeout after {duration_ms}ms")]
    ExecutionTimeout {
        /// The timeout duration in milliseconds.
        duration_ms: u64,
    },

    /// Execution exhausted the configured fuel limit.
    #[error("Fuel exhausted: CPU limit exceeded")]
    FuelExhausted,

    /// A WebAssembly trap occurred during execution.
    #[error("Wasm trap: {message}")]
    Trap {
        /// Description of the trap.
        message: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl RuntimeError {
    /// Create a new `CompilationFailed` error.
    pub fn compilation_failed(reason: impl Into<String>) -> Self {
        Self::CompilationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `InstantiationFailed` error.
    pub fn instantiation_failed(reason: impl Into<String>) -> Self {
        Self::InstantiationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `MissingExport` error.
    pub fn missing_export(name: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::MissingExport {
            name: name.into(),
            expected: expected.into(),
        }
    }

    /// Create a new `GuestAbi` error.
    pub fn guest_abi(reason: impl Into<String>) -> Self {
        Self::GuestAbi {
            reason: reason.into(),
        }
    }

    /// Create a new `Trap` error.
    pub fn trap(message: impl Into<String>) -> Self {
        Self::Trap {
            message: message.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error indicates a resource limit was exceeded.
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, Self::FuelExhausted | Self::ExecutionTimeout { .. })
    }
}

/// A failure that escaped the relay.
///
/// The relay never recovers from either variant. The split only records
/// whether the module could not be brought up or the call itself failed,
/// so the hosting runtime can say so in its logs.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Loading or initializing the module failed.
    #[error("module initialization failed: {0}")]
    Init(#[source] RuntimeError),

    /// The module's entry point failed.
    #[error("module invocation failed: {0}")]
    Invoke(#[source] RuntimeError),
}

impl RelayError {
    /// The underlying runtime error.
    pub fn runtime_error(&self) -> &RuntimeError {
        match self {
            Self::Init(e) | Self::Invoke(e) => e,
        }
    }

    /// Returns `true` if the failure happened during initialization.
    pub fn is_init(&self) -> bool {
        matches!(self, Self::Init(_))
    }
}

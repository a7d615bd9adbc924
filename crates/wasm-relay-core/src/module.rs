//! WebAssembly module compilation.
//!
//! [`CompiledModule`] wraps a Wasmtime [`Module`] compiled from the relay's
//! artifact, plus a content hash for logs. [`ModuleSource`] says where the
//! artifact's bytes come from.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, instrument};
use wasmtime::{Engine, ExternType, FuncType, Module, ValType};

use wasm_relay_common::RuntimeError;

/// Where the relayed module's bytes come from.
#[derive(Debug, Clone)]
pub enum ModuleSource {
    /// A WebAssembly binary held in memory.
    Bytes(Vec<u8>),
    /// WebAssembly text held in memory.
    Wat(String),
    /// A file on disk; `.wat` files are parsed as text.
    File(PathBuf),
}

impl ModuleSource {
    /// Read the source and compile it.
    ///
    /// File sources are read with `tokio::fs`, so this suspends the caller
    /// instead of blocking a worker thread.
    pub async fn compile(&self, engine: &Engine) -> Result<CompiledModule, RuntimeError> {
        match self {
            Self::Bytes(bytes) => CompiledModule::from_bytes(engine, bytes),
            Self::Wat(wat) => CompiledModule::from_wat(engine, wat),
            Self::File(path) => {
                let bytes = tokio::fs::read(path).await?;
                if is_wat_path(path) {
                    let wat = String::from_utf8(bytes).map_err(|e| {
                        RuntimeError::compilation_failed(format!(
                            "{} is not UTF-8 text: {e}",
                            path.display()
                        ))
                    })?;
                    CompiledModule::from_wat(engine, &wat)
                } else {
                    CompiledModule::from_bytes(engine, &bytes)
                }
            }
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            Self::Wat(wat) => format!("<wat, {} chars>", wat.len()),
            Self::File(path) => path.display().to_string(),
        }
    }
}

fn is_wat_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "wat")
}

/// A compiled core WebAssembly module.
///
/// Cloning is cheap; the underlying Wasmtime module is reference counted.
#[derive(Clone)]
pub struct CompiledModule {
    inner: Module,

    /// Hash of the source bytes (or text).
    content_hash: String,
}

impl CompiledModule {
    /// Compile a core module from WebAssembly bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid WebAssembly binary.
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> Result<Self, RuntimeError> {
        let start = Instant::now();

        Self::validate_wasm_header(bytes)?;

        let module = Module::new(engine, bytes).map_err(|e| {
            RuntimeError::compilation_failed(format!("Core module compilation failed: {e}"))
        })?;

        let content_hash = compute_hash(bytes);

        info!(
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "Core module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
        })
    }

    /// Compile a core module from WAT (WebAssembly Text Format).
    #[instrument(skip(engine, wat))]
    pub fn from_wat(engine: &Engine, wat: &str) -> Result<Self, RuntimeError> {
        let start = Instant::now();

        let module = Module::new(engine, wat).map_err(|e| {
            RuntimeError::compilation_failed(format!("WAT compilation failed: {e}"))
        })?;

        let content_hash = compute_hash(wat.as_bytes());

        info!(
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "WAT module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
        })
    }

    /// Get the content hash of the source.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Get the inner Wasmtime module.
    pub fn as_module(&self) -> &Module {
        &self.inner
    }

    /// Check that `name` is an exported function with the given signature.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::MissingExport`] if the export is absent, is
    /// not a function, or has a different signature.
    pub fn require_function(
        &self,
        name: &str,
        params: &[ValKind],
        results: &[ValKind],
    ) -> Result<(), RuntimeError> {
        let expected = describe_signature(params, results);

        match self.inner.get_export(name) {
            Some(ExternType::Func(ty)) if signature_matches(&ty, params, results) => Ok(()),
            _ => Err(RuntimeError::missing_export(name, expected)),
        }
    }

    /// Check that `name` is an exported linear memory.
    pub fn require_memory(&self, name: &str) -> Result<(), RuntimeError> {
        match self.inner.get_export(name) {
            Some(ExternType::Memory(_)) => Ok(()),
            _ => Err(RuntimeError::missing_export(name, "memory")),
        }
    }

    /// Validate WebAssembly header (magic number).
    fn validate_wasm_header(bytes: &[u8]) -> Result<(), RuntimeError> {
        if bytes.len() < 8 {
            return Err(RuntimeError::compilation_failed(
                "Invalid Wasm: file too small",
            ));
        }

        if &bytes[0..4] != b"\0asm" {
            return Err(RuntimeError::compilation_failed(
                "Invalid Wasm: bad magic number",
            ));
        }

        Ok(())
    }
}

/// Numeric value kinds used by the relay's guest ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValKind {
    I32,
    I64,
}

impl ValKind {
    fn matches(self, ty: &ValType) -> bool {
        match self {
            Self::I32 => matches!(ty, ValType::I32),
            Self::I64 => matches!(ty, ValType::I64),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
        }
    }
}

fn signature_matches(ty: &FuncType, params: &[ValKind], results: &[ValKind]) -> bool {
    kinds_match(ty.params(), params) && kinds_match(ty.results(), results)
}

fn kinds_match(actual: impl ExactSizeIterator<Item = ValType>, expected: &[ValKind]) -> bool {
    actual.len() == expected.len() && actual.zip(expected).all(|(a, e)| e.matches(&a))
}

fn describe_signature(params: &[ValKind], results: &[ValKind]) -> String {
    let join = |kinds: &[ValKind]| {
        kinds
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("function ({}) -> {}", join(params), join(results))
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WasmEngine;
    use wasm_relay_common::EngineConfig;

    // Minimal valid Wasm module (empty module)
    const MINIMAL_WASM: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, // magic: \0asm
        0x01, 0x00, 0x00, 0x00, // version: 1
    ];

    const RELAY_SHAPED_WAT: &str = r#"
        (module
            (memory (export "memory") 1)
            (func (export "alloc") (param i32) (result i32) (i32.const 0))
            (func (export "run") (param i32 i32) (result i64) (i64.const 0))
            (func (export "wrong") (param i32) (result i32) (i32.const 0))
        )
    "#;

    fn engine() -> WasmEngine {
        let config = EngineConfig {
            pooling_allocator: false,
            ..Default::default()
        };
        WasmEngine::new(&config).unwrap()
    }

    #[test]
    fn test_validate_wasm_header() {
        assert!(CompiledModule::validate_wasm_header(MINIMAL_WASM).is_ok());
        assert!(CompiledModule::validate_wasm_header(&[0x00, 0x61]).is_err());

        let bad_magic = &[0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        assert!(CompiledModule::validate_wasm_header(bad_magic).is_err());
    }

    #[test]
    fn test_compute_hash() {
        let hash1 = compute_hash(b"hello");
        let hash2 = compute_hash(b"hello");
        let hash3 = compute_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16);
    }

    #[test]
    fn test_module_compilation() {
        let engine = engine();
        let module = CompiledModule::from_bytes(engine.inner(), MINIMAL_WASM).unwrap();
        assert!(!module.content_hash().is_empty());

        let debug_str = format!("{module:?}");
        assert!(debug_str.contains("content_hash"));
    }

    #[test]
    fn test_require_exports() {
        let engine = engine();
        let module = CompiledModule::from_wat(engine.inner(), RELAY_SHAPED_WAT).unwrap();

        assert!(module.require_memory("memory").is_ok());
        assert!(
            module
                .require_function("alloc", &[ValKind::I32], &[ValKind::I32])
                .is_ok()
        );
        assert!(
            module
                .require_function("run", &[ValKind::I32, ValKind::I32], &[ValKind::I64])
                .is_ok()
        );

        let err = module
            .require_function("wrong", &[ValKind::I32, ValKind::I32], &[ValKind::I64])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing export 'wrong': function (i32, i32) -> i64"
        );

        assert!(module.require_memory("run").is_err());
        assert!(module.require_function("absent", &[], &[]).is_err());
    }

    #[tokio::test]
    async fn test_source_compile() {
        let engine = engine();

        let module = ModuleSource::Bytes(MINIMAL_WASM.to_vec())
            .compile(engine.inner())
            .await;
        assert!(module.is_ok());

        let module = ModuleSource::Wat("(module)".into())
            .compile(engine.inner())
            .await;
        assert!(module.is_ok());

        let missing = ModuleSource::File("/nonexistent/worker.wasm".into())
            .compile(engine.inner())
            .await;
        assert!(matches!(missing, Err(RuntimeError::Io(_))));
    }

    #[test]
    fn test_describe_source() {
        assert_eq!(ModuleSource::Bytes(vec![0; 8]).describe(), "<8 bytes>");
        assert_eq!(
            ModuleSource::File("worker.wasm".into()).describe(),
            "worker.wasm"
        );
        assert!(is_wat_path(Path::new("echo.wat")));
        assert!(!is_wat_path(Path::new("echo.wasm")));
    }
}

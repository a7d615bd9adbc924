//! The request relay.
//!
//! [`Relay`] bridges a request to a module's single entry point:
//!
//! ```text
//! request ──► Relay::handle ──► once-guarded ModuleInit::init ──► EntryPoint::run ──► RelayResponse
//! ```
//!
//! The module handle is created at most once per relay. Concurrent first
//! callers wait on the same initialization; later callers never touch the
//! initializer again. Failures from either step leave the relay as
//! [`RelayError`]s and nothing in here retries, logs-and-swallows or
//! rewrites them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::RelayRequest;
use wasm_relay_common::{RelayError, RuntimeError};

/// The module's exported entry point.
#[async_trait]
pub trait EntryPoint: Send + Sync {
    /// Run the module on one request and return its output.
    async fn run(&self, request: RelayRequest) -> Result<String, RuntimeError>;
}

/// One-time module initialization.
#[async_trait]
pub trait ModuleInit: Send + Sync {
    /// The initialized module.
    type Handle: EntryPoint;

    /// Load and initialize the module.
    async fn init(&self) -> Result<Self::Handle, RuntimeError>;
}

/// What the relay hands back on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    /// Exactly the string returned by the entry point.
    pub body: String,
}

impl RelayResponse {
    /// The only header the relay sets.
    pub const CONTENT_TYPE: &'static str = "application/json;charset=UTF-8";

    /// Wrap an entry point's output.
    pub fn new(body: String) -> Self {
        Self { body }
    }

    /// Headers carried by every relay response.
    pub fn headers(&self) -> [(&'static str, &'static str); 1] {
        [("Content-Type", Self::CONTENT_TYPE)]
    }
}

/// A response the hosting runtime has been promised but not yet computed.
pub type RelayFuture = Pin<Box<dyn Future<Output = Result<RelayResponse, RelayError>> + Send>>;

/// Relays requests to a lazily initialized module.
pub struct Relay<I: ModuleInit> {
    init: I,
    handle: OnceCell<I::Handle>,
}

impl<I: ModuleInit> Relay<I> {
    /// Create a relay; the module is not initialized until the first request.
    pub fn new(init: I) -> Self {
        Self {
            init,
            handle: OnceCell::new(),
        }
    }

    /// Returns `true` once the module handle exists.
    pub fn is_initialized(&self) -> bool {
        self.handle.initialized()
    }

    /// The initializer this relay was built with.
    pub fn initializer(&self) -> &I {
        &self.init
    }

    /// Get the module handle, initializing it on first use.
    ///
    /// A failed initialization leaves the relay uninitialized, so a later
    /// call tries again.
    pub async fn module(&self) -> Result<&I::Handle, RelayError> {
        self.handle
            .get_or_try_init(|| self.init.init())
            .await
            .map_err(RelayError::Init)
    }

    /// Handle one request.
    ///
    /// The request is passed to the entry point untouched and the output
    /// becomes the response body unchanged.
    pub async fn handle(&self, request: RelayRequest) -> Result<RelayResponse, RelayError> {
        let module = self.module().await?;
        let body = module.run(request).await.map_err(RelayError::Invoke)?;
        Ok(RelayResponse::new(body))
    }
}

impl<I: ModuleInit + 'static> Relay<I> {
    /// Commit to answering `request` and return the eventual response.
    ///
    /// Nothing runs until the returned future is polled, so the caller can
    /// hand it to whatever drives the response before any work happens.
    pub fn respond(self: Arc<Self>, request: RelayRequest) -> RelayFuture {
        Box::pin(async move { self.handle(request).await })
    }
}

impl<I: ModuleInit> std::fmt::Debug for Relay<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

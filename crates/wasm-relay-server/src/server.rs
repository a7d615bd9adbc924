//! HTTP server implementation.
//!
//! This module provides [`RelayServer`], which binds the router, keeps the
//! engine's epoch moving and shuts down on SIGINT/SIGTERM.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use wasm_relay_common::{RuntimeConfig, RuntimeError, ServerConfigFile};
use wasm_relay_core::{ModuleSource, WasmEngine};

use crate::router::build_router;
use crate::state::{AppState, DEFAULT_MAX_BODY_BYTES};

/// How often the epoch advances; execution deadlines are counted in ticks.
const EPOCH_TICK: Duration = Duration::from_millis(1);

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server.
    pub bind_addr: SocketAddr,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Enable graceful shutdown on SIGTERM/SIGINT.
    pub graceful_shutdown: bool,
    /// Largest request body read before answering `413`.
    pub max_body_bytes: usize,
    /// Path answered by the health handler instead of the relay.
    pub health_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            request_timeout_secs: 30,
            graceful_shutdown: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            health_path: None,
        }
    }
}

impl ServerConfig {
    /// Build from the `[server]` section of a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if `bind_addr` is not a valid socket address.
    pub fn from_file(file: &ServerConfigFile) -> Result<Self, RuntimeError> {
        let bind_addr = file.bind_addr.parse().map_err(|e| {
            RuntimeError::invalid_config(format!("Invalid bind_addr '{}': {e}", file.bind_addr))
        })?;

        Ok(Self {
            bind_addr,
            request_timeout_secs: file.request_timeout_secs,
            graceful_shutdown: file.graceful_shutdown,
            max_body_bytes: file.max_body_bytes,
            health_path: file.health_path.clone(),
        })
    }

    /// Create a new server config with custom bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Create a new server config with custom timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Create a new server config with a custom request body limit.
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    /// Serve a health check at `path`.
    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = Some(path.into());
        self
    }

    /// Get the request timeout as Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// The relay's HTTP server.
pub struct RelayServer {
    /// Application state.
    state: AppState,
    /// Server configuration.
    config: ServerConfig,
}

impl RelayServer {
    /// Create a server for the module named in `runtime_config`.
    ///
    /// # Errors
    ///
    /// Returns an error if no module path is configured or the runtime
    /// cannot be set up.
    pub fn new(
        runtime_config: &RuntimeConfig,
        server_config: ServerConfig,
    ) -> Result<Self, RuntimeError> {
        let state = AppState::new(runtime_config)?;
        Ok(Self::with_state(state, server_config))
    }

    /// Create a server around existing state.
    ///
    /// The state takes the body limit from `config`.
    pub fn with_state(state: AppState, config: ServerConfig) -> Self {
        Self {
            state: state.with_max_body_bytes(config.max_body_bytes),
            config,
        }
    }

    /// Get a reference to the application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind to the address.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| RuntimeError::invalid_config(format!("Failed to bind: {e}")))?;

        let ticker = spawn_epoch_ticker(self.state.engine());
        let app = build_router(
            self.state,
            self.config.request_timeout(),
            self.config.health_path.as_deref(),
        );

        info!(
            addr = %self.config.bind_addr,
            health_path = self.config.health_path.as_deref().unwrap_or("<none>"),
            "Starting HTTP server"
        );

        let served = if self.config.graceful_shutdown {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
        } else {
            axum::serve(listener, app).await
        };

        if let Some(ticker) = ticker {
            ticker.abort();
        }
        served.map_err(|e| RuntimeError::invalid_config(format!("Server error: {e}")))?;

        info!("Server shutdown complete");
        Ok(())
    }

    /// Start a server for `source` on an ephemeral port and return a
    /// handle for testing.
    pub async fn start_test(
        runtime_config: &RuntimeConfig,
        source: ModuleSource,
    ) -> Result<TestHandle, RuntimeError> {
        let state = AppState::with_source(runtime_config, source)?;
        let app = build_router(state.clone(), Duration::from_secs(30), Some("/_relay/health"));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| RuntimeError::invalid_config(format!("Failed to bind: {e}")))?;

        let addr = listener
            .local_addr()
            .map_err(|e| RuntimeError::invalid_config(format!("Failed to get addr: {e}")))?;

        let ticker = spawn_epoch_ticker(state.engine());
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(TestHandle {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle,
            ticker,
        })
    }
}

/// Handle for a test server instance.
pub struct TestHandle {
    /// The address the server is bound to.
    addr: SocketAddr,
    /// Application state.
    state: AppState,
    /// Shutdown signal sender.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Server task handle.
    handle: JoinHandle<Result<(), std::io::Error>>,
    /// Epoch ticker, if the engine uses epochs.
    ticker: Option<JoinHandle<()>>,
}

impl TestHandle {
    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the server URL.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Shutdown the server gracefully.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// Advance the engine epoch every [`EPOCH_TICK`] so store deadlines expire.
///
/// Returns `None` when the engine was built without epoch interruption.
fn spawn_epoch_ticker(engine: &WasmEngine) -> Option<JoinHandle<()>> {
    if !engine.is_epoch_enabled() {
        return None;
    }

    let engine = engine.clone();
    debug!(tick_ms = EPOCH_TICK.as_millis(), "Starting epoch ticker");

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(EPOCH_TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            engine.increment_epoch();
        }
    }))
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

//! wasm-relay CLI entry point.
//!
//! Serves HTTP and relays every request to a single WebAssembly module.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use wasm_relay_common::ConfigFile;
use wasm_relay_server::{RelayServer, ServerConfig};

/// Relay HTTP requests to a WebAssembly module.
#[derive(Debug, Parser)]
#[command(name = "wasm-relay", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// WebAssembly module to relay to (`.wasm` or `.wat`).
    #[arg(short, long, env = "RELAY_MODULE")]
    module: Option<PathBuf>,

    /// Address to listen on, e.g. `0.0.0.0:8080`.
    #[arg(short, long, env = "BIND_ADDR")]
    bind: Option<SocketAddr>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,wasm_relay=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!("Starting wasm-relay");

    let file = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => ConfigFile::default(),
    };

    let mut runtime_config = file.runtime;
    if let Some(module) = cli.module {
        runtime_config.module.path = Some(module);
    }
    let Some(module_path) = runtime_config.module.path.clone() else {
        bail!("No module configured. Pass --module, set RELAY_MODULE or set module.path in the config file");
    };

    let mut server_config =
        ServerConfig::from_file(&file.server).context("Invalid [server] configuration")?;
    if let Some(bind) = cli.bind {
        server_config = server_config.with_bind_addr(bind);
    }

    info!(
        module = %module_path.display(),
        bind_addr = %server_config.bind_addr,
        fuel_metering = runtime_config.execution.fuel_metering,
        timeout_ms = runtime_config.execution.timeout_ms,
        "Configuration loaded"
    );

    let server = RelayServer::new(&runtime_config, server_config)?;
    server.run().await?;

    Ok(())
}

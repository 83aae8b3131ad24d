//! openapi-gate
//!
//! Validates HTTP requests against a Swagger/OpenAPI description before they
//! reach the service behind it.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────┐
//!                      │                 OPENAPI GATE                   │
//!                      │                                                │
//!   description file   │  ┌─────────────┐   ┌──────────┐                │
//!   ───────────────────┼─▶│ description │──▶│ compiler │─┐              │
//!                      │  │   loader    │   │          │ │ RuleTable    │
//!                      │  └─────────────┘   └──────────┘ │ PathIndex    │
//!                      │                                 ▼              │
//!   Client Request     │  ┌──────┐   ┌────────────┐   ┌────────────┐    │
//!   ───────────────────┼─▶│ http │──▶│ middleware │──▶│ validation │    │
//!                      │  └──────┘   └─────┬──────┘   └────────────┘    │
//!                      │                   │ passed                     │
//!                      │                   ▼                            │   Upstream
//!                      │             ┌───────────┐                      │   Service
//!                      │             │   proxy   │──────────────────────┼──────────▶
//!                      │             └───────────┘                      │
//!                      └───────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use openapi_gate::config::{load_config, validate_config, ConfigError, GateConfig};
use openapi_gate::http::{GateServer, GateState};
use openapi_gate::lifecycle::{forward_signals, prepare_gate, Shutdown};
use openapi_gate::observability::{init_logging, init_metrics};

#[derive(Parser)]
#[command(name = "openapi-gate")]
#[command(about = "Validate requests against a Swagger/OpenAPI description", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Description file (overrides `description.path`).
    #[arg(short, long)]
    spec: Option<PathBuf>,

    /// Listener address (overrides `listener.bind_address`).
    #[arg(short, long)]
    bind: Option<String>,

    /// Upstream address (overrides `upstream.address`).
    #[arg(short, long)]
    upstream: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate requests and forward them to the upstream
    Serve,
    /// Compile the description and print the rule table
    Check,
}

fn resolve_config(cli: &Cli) -> Result<GateConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };

    if let Some(spec) = &cli.spec {
        config.description.path = spec.display().to_string();
    }
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(upstream) = &cli.upstream {
        config.upstream.address = upstream.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    init_logging(&config.observability.log_level);
    tracing::info!("openapi-gate v{} starting", env!("CARGO_PKG_VERSION"));

    let gate = prepare_gate(Path::new(&config.description.path), &config.validation).await?;

    match cli.command {
        Command::Check => {
            println!("{}", serde_json::to_string_pretty(gate.compiled.as_ref())?);
            Ok(())
        }
        Command::Serve => {
            if config.observability.metrics_enabled {
                // Address already checked by validate_config.
                if let Ok(addr) = config.observability.metrics_address.parse() {
                    init_metrics(addr);
                }
            }

            let state = GateState::new(gate.orchestrator, config.validation.max_body_bytes);
            let server = GateServer::proxy(
                state,
                &config.upstream.address,
                Duration::from_secs(config.timeouts.request_secs),
            )?;

            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            tracing::info!(
                address = %listener.local_addr()?,
                upstream = %config.upstream.address,
                mode = ?config.validation.mode,
                "Listening for connections"
            );

            let shutdown = Shutdown::new();
            let receiver = shutdown.subscribe();
            tokio::spawn(async move { forward_signals(&shutdown).await });

            server.run(listener, receiver).await?;

            tracing::info!("Shutdown complete");
            Ok(())
        }
    }
}

//! API Gateway
//!
//! The single public entry point for the platform's backend services,
//! built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                   API GATEWAY                     │
//!                     │                                                   │
//!   Client Request    │  ┌─────────────┐   ┌──────────┐   ┌───────────┐  │
//!   ──────────────────┼─▶│ correlation │──▶│   rate   │──▶│  registry │  │
//!                     │  │  + tracing  │   │  limiter │   │   router  │  │
//!                     │  └─────────────┘   └──────────┘   └─────┬─────┘  │
//!                     │                                          │        │
//!                     │                  ┌────────────┐   ┌──────▼─────┐  │
//!                     │                  │  feature   │◀──│    auth    │  │
//!                     │                  │    gate    │   │   filter   │  │
//!                     │                  └─────┬──────┘   └────────────┘  │
//!                     │                        │                          │
//!   Client Response   │  ┌─────────────┐   ┌───▼──────────────────────┐   │
//!   ◀─────────────────┼──│    error    │◀──│     resilient client     │◀──┼── Backend
//!                     │  │  envelope   │   │ breaker · retry · budget │   │   Services
//!                     │  └─────────────┘   └──────────────────────────┘   │
//!                     │                                                   │
//!                     │  config · registry · observability · lifecycle    │
//!                     └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_gateway::config;
use api_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "Edge gateway for the platform's backend services", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Without one, configuration comes
    /// from built-in defaults plus environment variables.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Override the listener port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::load_from_env()?,
    };
    if let Some(port) = cli.port {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{host}:{port}");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        rate_limit_enabled = config.rate_limit.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => api_gateway::observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

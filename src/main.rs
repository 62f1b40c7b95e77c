//! Supabase relay.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                   RELAY                       │
//!     Client Request    │  ┌──────────┐   ┌──────────┐   ┌──────────┐  │
//!     ──────────────────┼─▶│request id│──▶│   cors   │──▶│  router  │  │
//!                       │  └──────────┘   └──────────┘   └────┬─────┘  │
//!                       │                     GET /test ◀─────┤        │
//!                       │                                     ▼        │
//!                       │                              ┌────────────┐  │
//!                       │                              │   relay    │──┼──▶ Upstream
//!     Client Response   │                              │ (apikey    │  │    (Supabase)
//!     ◀─────────────────┼──────────────────────────────│  default)  │◀─┼───
//!                       │                              └────────────┘  │
//!                       └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use supabase_relay::config::load_config;
use supabase_relay::lifecycle::{signals, startup, Shutdown};
use supabase_relay::observability::{logging, metrics};
use supabase_relay::HttpServer;

#[derive(Parser)]
#[command(name = "supabase-relay")]
#[command(about = "Relays HTTP requests to a Supabase project, filling in the API key", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port; overrides the config file and PORT.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref(), cli.port)?;

    logging::init_logging(&config.observability);
    tracing::info!("supabase-relay v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(config.listener.bind_address()).await?;
    startup::log_banner(&config, listener.local_addr()?);

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

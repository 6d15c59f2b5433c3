//! Metadata daemon.
//!
//! Serves a key/value store over two HTTP endpoints and forwards lookup
//! misses to an upstream metadata service.
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │               METADATA PROXY                 │
//!                        │                                              │
//!   Admin client         │  ┌──────────┐   PUT    ┌────────────┐        │
//!   (unix socket) ───────┼─▶│  admin   │─────────▶│ update pump│        │
//!                        │  │ listener │          └─────┬──────┘        │
//!                        │  └────┬─────┘                │ merge         │
//!                        │       │ GET                  ▼               │
//!                        │       │             ┌─────────────────┐      │
//!   Containers           │  ┌────▼─────┐ GET   │  KeyValueStore  │      │
//!   (tcp :3131) ─────────┼─▶│ service  │──────▶│                 │      │
//!                        │  │ listener │       └─────────────────┘      │
//!                        │  └────┬─────┘ miss                           │
//!                        │       └──────────▶ Forwarder ────────────────┼──▶ upstream
//!                        │                                              │
//!                        │  Shutdown: signals/trigger → admin, service, │
//!                        │            pump, PID file                    │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use metadata_proxy::admin::handlers::PluginInfo;
use metadata_proxy::config::{resolve_config, Overrides};
use metadata_proxy::lifecycle::{start, Shutdown, StartOptions};
use metadata_proxy::net::ListenAddr;
use metadata_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "metadata-proxy")]
#[command(about = "Metadata plugin for instance metadata", long_about = None)]
struct Cli {
    /// Listen address (unix or tcp) for the control endpoint
    #[arg(long)]
    listen: Option<ListenAddr>,

    /// TCP host:port for the service endpoint
    #[arg(long)]
    port: Option<String>,

    /// Forward host:port for lookup misses
    #[arg(long)]
    forward: Option<String>,

    /// Logging level. 0 is least verbose. Max is 5
    #[arg(long)]
    log: Option<i64>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print build version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Version) = cli.command {
        println!("{}", serde_json::to_string_pretty(&PluginInfo::current())?);
        return Ok(());
    }

    let service = cli
        .port
        .as_deref()
        .map(ListenAddr::tcp)
        .transpose()?;
    let overrides = Overrides {
        admin: cli.listen,
        service,
        forward: cli.forward,
        log_level: cli.log,
        json_logs: cli.json_logs,
    };
    let config = resolve_config(cli.config.as_deref(), overrides)?;

    logging::init_logging(config.observability.log_level, config.observability.json_logs)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "metadata-proxy starting");

    tracing::info!(
        admin = %config.admin.address,
        service = %config.service.address,
        forward = %config.forward.host_port,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let daemon = start(&config, Shutdown::new(), StartOptions::default()).await?;
    daemon.wait().await?;
    Ok(())
}

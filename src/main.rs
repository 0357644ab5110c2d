//! Config Server
//!
//! Serves per-product configuration values over HTTP, reloading them from
//! disk as files change.
//!
//! # Architecture Overview
//!
//! ```text
//!     configurations/<product>/*.yml ──▶ watch::ConfigTreeTarget ──▶ store::ConfigStore
//!     allowed_ips.txt ─────────────────▶ watch::AllowListTarget  ──▶ allowlist::AllowList
//!                                                                          │
//!     Client Request ──▶ http::HttpServer ──▶ pipeline::AuthorizationPipeline
//!                                               IP gate → rate gate → auth → path → lookup
//!     Client Response ◀── http::response ◀──────────────┘
//!
//!     Cross-cutting: audit (event sinks), observability (tracing, metrics),
//!                    lifecycle (scaffold, startup, signals, shutdown)
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use config_server::config::{load_config, Overrides};
use config_server::lifecycle::shutdown::drain;
use config_server::lifecycle::{self, signals, startup};
use config_server::observability::{logging, metrics};
use config_server::http::AppState;
use config_server::{HttpServer, Shutdown};

/// Hot-reloaded per-product configuration server.
#[derive(Parser, Debug)]
#[command(name = "config-server", version, about, long_about = None)]
struct Cli {
    /// TOML settings file; defaults are used when omitted.
    #[arg(long, env = "CONFIG_SERVER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Directory containing configuration files.
    #[arg(long, env = "CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// File containing allowed IP addresses.
    #[arg(long = "allowed-ips", env = "ALLOWED_IPS_FILE")]
    allowed_ips: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Shared secret for HS256 bearer tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let overrides = Overrides {
        config_dir: cli.config_dir,
        allowed_ips_file: cli.allowed_ips,
        port: cli.port,
        jwt_secret: cli.jwt_secret,
    };
    let config = load_config(cli.settings.as_deref(), overrides)?;

    logging::init(config.observability.log_format);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "config-server starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        config_dir = %config.paths.config_dir.display(),
        allowed_ips_file = %config.paths.allowed_ips_file.display(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let sink = startup::build_sink(&config.audit)?;
    let services = lifecycle::start(&config, sink, &shutdown)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let state = AppState {
        pipeline: services.pipeline.clone(),
        sink: services.sink.clone(),
    };
    let server = HttpServer::new(state, &config.timeouts);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move { signals::shutdown_on_signal(&shutdown).await }
    });

    let result = server.run(listener, server_shutdown).await;
    // the server may also stop on its own; background tasks go either way
    shutdown.trigger();

    drain(services.tasks, DRAIN_DEADLINE).await;
    result?;

    tracing::info!("Shutdown complete");
    Ok(())
}

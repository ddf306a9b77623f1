//! Prefix-stripping reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                STRIP-PREFIX PROXY                │
//!   Client Request     │  ┌──────────┐   ┌──────────────┐   ┌──────────┐  │
//!   ───────────────────┼─▶│   http   │──▶│    strip     │──▶│ forward  │──┼──▶ Upstream
//!   GET /api/users     │  │  server  │   │ /api → /users│   │  client  │  │    GET /users
//!                      │  └──────────┘   └──────┬───────┘   └──────────┘  │    X-Forwarded-Prefix: /api
//!                      │                        │ no match                │
//!   ◀──────────────────┼────────────────────────┘ 404                     │
//!                      │                                                  │
//!                      │  config (TOML, hot reload) · observability ·     │
//!                      │  lifecycle (signals, graceful shutdown)          │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::error::Error;
use std::path::PathBuf;

use axum::http::Uri;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use strip_prefix_proxy::config::{read_config, validate_config, ConfigError, ConfigWatcher, StripConfig};
use strip_prefix_proxy::http::HttpServer;
use strip_prefix_proxy::lifecycle::Shutdown;
use strip_prefix_proxy::observability::{logging, metrics};
use strip_prefix_proxy::strip::RequestPath;

#[derive(Parser)]
#[command(name = "strip-prefix-proxy")]
#[command(about = "Strip path prefixes and forward requests to an upstream", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy (default)
    Serve {
        /// Do not reload the configuration file when it changes
        #[arg(long)]
        no_watch: bool,
    },
    /// Print how a request target would be rewritten, as JSON
    Check {
        /// Request target as sent on the wire, e.g. `/api/users?page=2`
        target: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => read_config(path)?,
        None => StripConfig::default(),
    };

    match cli.command.unwrap_or(Commands::Serve { no_watch: false }) {
        Commands::Serve { no_watch } => {
            let watch = if no_watch { None } else { cli.config };
            serve(config, watch).await
        }
        Commands::Check { target } => check(&config, &target),
    }
}

async fn serve(config: StripConfig, watch: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    logging::init_logging(&config.observability);
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!("strip-prefix-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        prefixes = ?config.strip.prefixes,
        match_mode = ?config.strip.match_mode,
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

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match watch {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(&path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn check(config: &StripConfig, target: &str) -> Result<(), Box<dyn Error>> {
    let report = rewrite_report(config, target)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn rewrite_report(config: &StripConfig, target: &str) -> Result<Value, Box<dyn Error>> {
    let uri: Uri = target.parse()?;
    let path = RequestPath::from_uri(&uri);
    let prefixes = config.strip.to_prefix_list();

    let report = match prefixes.rewrite(&path) {
        Some(rewrite) => {
            let rewritten = rewrite.path.to_uri(&uri)?;
            json!({
                "matched": true,
                "match_mode": prefixes.match_mode(),
                "prefix": rewrite.prefix,
                "trailing_slash": rewrite.trailing_slash,
                "path": rewrite.path,
                "uri": rewritten.to_string(),
            })
        }
        None => json!({
            "matched": false,
            "match_mode": prefixes.match_mode(),
            "status": 404,
            "path": path,
        }),
    };

    Ok(report)
}

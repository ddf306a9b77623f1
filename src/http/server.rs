//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the prefix stripper as its fallback
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Forward stripped requests to the upstream
//! - Swap in a rebuilt stripper when a new configuration arrives
//! - Serve until the shutdown signal fires

use std::convert::Infallible;
use std::time::Duration;

use axum::error_handling::HandleError;
use axum::http::uri::InvalidUri;
use axum::http::StatusCode;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::StripConfig;
use crate::http::forward::Forwarder;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::strip::{DownstreamSlot, SlotError, StripPrefix};

/// The stripper as deployed: prefixes from config in front of the upstream.
pub type Stripper = StripPrefix<Forwarder>;

/// Errors raised while building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid upstream address: {0}")]
    Upstream(#[from] InvalidUri),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build a stripper from the `strip` and `upstream` sections of `config`.
pub fn build_stripper(config: &StripConfig) -> Result<Stripper, ServerError> {
    let forwarder = Forwarder::new(&config.upstream.address)?;
    Ok(StripPrefix::new(forwarder, config.strip.to_prefix_list()))
}

/// HTTP server for the prefix-stripping proxy.
pub struct HttpServer {
    router: Router,
    config: StripConfig,
    stripper: DownstreamSlot<Stripper>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: StripConfig) -> Result<Self, ServerError> {
        let stripper = DownstreamSlot::new(build_stripper(&config)?);
        let router = Self::build_router(&config, stripper.clone());

        Ok(Self {
            router,
            config,
            stripper,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &StripConfig, stripper: DownstreamSlot<Stripper>) -> Router {
        Router::new()
            .fallback_service(HandleError::<_, _, ()>::new(stripper, stripper_unavailable))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<StripConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            prefixes = ?self.config.strip.prefixes,
            "HTTP server starting"
        );

        let stripper = self.stripper.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                if let Err(e) = apply_config(&stripper, &config) {
                    tracing::error!(error = %e, "Failed to apply new configuration");
                }
            }
        });

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Replace the running stripper with one built from `config`.
///
/// Only the `strip` and `upstream` sections take effect; in-flight
/// requests finish on the previous stripper.
fn apply_config(slot: &DownstreamSlot<Stripper>, config: &StripConfig) -> Result<(), ServerError> {
    let stripper = build_stripper(config)?;
    slot.set(stripper);
    tracing::info!(
        prefixes = ?config.strip.prefixes,
        match_mode = ?config.strip.match_mode,
        upstream = %config.upstream.address,
        "Prefix configuration applied"
    );
    Ok(())
}

async fn stripper_unavailable(err: SlotError<Infallible>) -> StatusCode {
    tracing::error!(error = %err, "Stripper unavailable");
    StatusCode::INTERNAL_SERVER_ERROR
}

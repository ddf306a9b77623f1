//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Warn about prefix hazards without rejecting them
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Prefixes are never rejected: an empty prefix matching everything is
//!   legal, so it is only logged

use std::net::SocketAddr;

use axum::http::uri::Authority;
use thiserror::Error;

use crate::config::schema::StripConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    InvalidBindAddress(String),

    #[error("upstream.address `{0}` is not a valid authority")]
    InvalidUpstream(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("listener.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
}

/// Check `config`, collecting every error.
pub fn validate_config(config: &StripConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }
    if config.upstream.address.parse::<Authority>().is_err() {
        errors.push(ValidationError::InvalidUpstream(config.upstream.address.clone()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    warn_prefix_hazards(config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn warn_prefix_hazards(config: &StripConfig) {
    let prefixes = &config.strip.prefixes;
    if prefixes.is_empty() {
        tracing::warn!("No prefixes configured, every request will get 404");
    }
    for (index, prefix) in prefixes.iter().enumerate() {
        if prefix.is_empty() {
            tracing::warn!(index, "Empty prefix matches every path");
        } else if !prefix.starts_with('/') {
            tracing::warn!(index, prefix = %prefix, "Prefix does not start with '/'");
        }
        if let Some(earlier) = prefixes[..index].iter().find(|p| prefix.starts_with(p.as_str())) {
            tracing::warn!(prefix = %prefix, shadowed_by = %earlier, "Prefix is shadowed by an earlier one");
        }
    }
}

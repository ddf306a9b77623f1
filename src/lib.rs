//! Path-prefix stripping middleware and proxy.
//!
//! [`strip::StripPrefixLayer`] removes the first matching configured prefix
//! from a request path, records it in the request extensions and the
//! `X-Forwarded-Prefix` header, and hands the request on; unmatched requests
//! get `404`. The binary puts it in front of a single upstream.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod strip;

pub use config::StripConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use strip::{StripPrefix, StripPrefixLayer, StrippedPrefix};

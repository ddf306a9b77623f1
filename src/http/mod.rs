//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware layers)
//!     → request.rs (add request ID)
//!     → strip (prefix match, rewrite, annotate) or 404
//!     → forward.rs (send to upstream)
//!     → Send response to client
//! ```

pub mod forward;
pub mod request;
pub mod server;

pub use forward::Forwarder;
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{build_stripper, HttpServer, ServerError, Stripper};

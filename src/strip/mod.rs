//! Prefix stripping subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, raw path, headers)
//!     → prefixes.rs (first configured prefix the decoded path starts with)
//!     → path.rs (remove prefix from decoded and raw path, rebuild URI)
//!     → service.rs (annotate extensions, append X-Forwarded-Prefix)
//!     → inner service (or slot.rs when bound late)
//!
//! No match:
//!     → 404 Not Found, inner service never called
//! ```
//!
//! # Design Decisions
//! - Exactly one of {delegate, 404} per request
//! - Provenance is a typed extension ([`StrippedPrefix`]), not a keyed lookup
//! - Prefix lists are immutable; reconfiguration swaps the whole stripper

pub mod extension;
pub mod path;
pub mod prefixes;
pub mod service;
pub mod slot;

pub use extension::{forwarded_prefix, forwarded_prefixes, StrippedPrefix, StrippedPrefixExt, X_FORWARDED_PREFIX};
pub use path::{ensure_leading_slash, strip_prefix, RequestPath};
pub use prefixes::{MatchMode, PrefixList, Rewrite};
pub use service::{StripPrefix, StripPrefixLayer};
pub use slot::{DownstreamSlot, SlotError};

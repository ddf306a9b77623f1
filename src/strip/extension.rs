//! Per-request provenance of the stripped prefix.

use axum::http::{HeaderMap, HeaderName, Request};

/// Header carrying the prefixes removed along the proxy chain.
pub const X_FORWARDED_PREFIX: HeaderName = HeaderName::from_static("x-forwarded-prefix");

/// Inserted into the request extensions when a prefix was stripped.
///
/// Lives only as long as the request. A later stripper in the same chain
/// replaces it; the full chain is in [`X_FORWARDED_PREFIX`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedPrefix {
    /// The matched prefix, whitespace-trimmed.
    pub prefix: String,

    /// True iff the original path was exactly the prefix plus `/`.
    pub trailing_slash: bool,
}

/// Accessors for [`StrippedPrefix`] on a request.
pub trait StrippedPrefixExt {
    fn stripped_prefix(&self) -> Option<&str>;
    fn stripped_trailing_slash(&self) -> Option<bool>;
}

impl<B> StrippedPrefixExt for Request<B> {
    fn stripped_prefix(&self) -> Option<&str> {
        self.extensions()
            .get::<StrippedPrefix>()
            .map(|stripped| stripped.prefix.as_str())
    }

    fn stripped_trailing_slash(&self) -> Option<bool> {
        self.extensions()
            .get::<StrippedPrefix>()
            .map(|stripped| stripped.trailing_slash)
    }
}

/// All `X-Forwarded-Prefix` values, outermost first.
pub fn forwarded_prefixes(headers: &HeaderMap) -> Vec<&str> {
    headers
        .get_all(X_FORWARDED_PREFIX)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect()
}

/// The mount path the request originally arrived under, rebuilt from the
/// `X-Forwarded-Prefix` chain.
pub fn forwarded_prefix(headers: &HeaderMap) -> String {
    forwarded_prefixes(headers).concat()
}

//! Path rewriting primitives.
//!
//! # Responsibilities
//! - Remove a literal prefix from a path and normalize the leading slash
//! - Keep the decoded and raw (percent-encoded) path side by side
//! - Rebuild the request URI from the rewritten path and original query
//!
//! # Design Decisions
//! - Prefixes are removed byte-wise, no normalization
//! - The decoded path is kept as bytes, so escapes that are not UTF-8 survive a rewrite
//! - The raw path is rewritten on its own, never re-derived from the decoded path
//! - The raw path is only trusted when it still decodes to the decoded path

use std::borrow::Cow;

use axum::http::uri::{PathAndQuery, Uri};
use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, CONTROLS};
use serde::{Serialize, Serializer};

/// Characters escaped when a decoded path has to be turned back into a URI path.
const PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Returns `s` starting with exactly one `/`.
///
/// Any run of leading slashes collapses into a single one, so applying this
/// twice is the same as applying it once.
pub fn ensure_leading_slash(s: &str) -> String {
    format!("/{}", s.trim_start_matches('/'))
}

/// Removes `prefix` from the front of `s` (if present) and ensures the result
/// starts with a single `/`.
pub fn strip_prefix(s: &str, prefix: &str) -> String {
    ensure_leading_slash(s.strip_prefix(prefix).unwrap_or(s))
}

fn strip_prefix_bytes(s: &[u8], prefix: &[u8]) -> Vec<u8> {
    let rest = s.strip_prefix(prefix).unwrap_or(s);
    let start = rest.iter().position(|&b| b != b'/').unwrap_or(rest.len());

    let mut out = Vec::with_capacity(rest.len() - start + 1);
    out.push(b'/');
    out.extend_from_slice(&rest[start..]);
    out
}

/// Decoded and raw representations of a request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestPath {
    /// Percent-decoded path, used for prefix matching.
    #[serde(rename = "path", serialize_with = "serialize_lossy")]
    decoded: Vec<u8>,

    /// Encoded path as received, present only when it differs from the decoded path.
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_path: Option<String>,
}

fn serialize_lossy<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

impl RequestPath {
    /// Create a path with no distinct raw representation.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            decoded: path.into().into_bytes(),
            raw_path: None,
        }
    }

    /// Create a path from both representations.
    pub fn with_raw(path: impl Into<String>, raw_path: impl Into<String>) -> Self {
        Self {
            decoded: path.into().into_bytes(),
            raw_path: Some(raw_path.into()),
        }
    }

    /// Build from a percent-encoded path as it appears on the wire.
    pub fn from_encoded(encoded: &str) -> Self {
        let decoded: Vec<u8> = percent_decode_str(encoded).collect();
        let raw_path = (decoded != encoded.as_bytes()).then(|| encoded.to_string());
        Self { decoded, raw_path }
    }

    /// Build from the path component of a request URI.
    pub fn from_uri(uri: &Uri) -> Self {
        Self::from_encoded(uri.path())
    }

    /// The decoded path bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.decoded
    }

    /// The decoded path, with bytes that are not UTF-8 replaced.
    pub fn path(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.decoded)
    }

    pub fn raw_path(&self) -> Option<&str> {
        self.raw_path.as_deref()
    }

    /// Strip `prefix` from both representations.
    ///
    /// An empty raw path is left alone.
    pub fn strip(&mut self, prefix: &str) {
        self.decoded = strip_prefix_bytes(&self.decoded, prefix.as_bytes());
        if let Some(raw) = self.raw_path.as_mut().filter(|raw| !raw.is_empty()) {
            *raw = strip_prefix(raw, prefix);
        }
    }

    /// The path as it should be written into a URI.
    ///
    /// Uses `raw_path` when it is a valid encoding of the decoded path,
    /// otherwise encodes the decoded bytes from scratch. Either way the
    /// result only holds characters a URI path accepts.
    pub fn escaped_path(&self) -> String {
        if let Some(raw) = self.raw_path.as_deref() {
            if percent_decode_str(raw).eq(self.decoded.iter().copied()) {
                return raw.to_string();
            }
        }
        percent_encode(&self.decoded, PATH_ENCODE_SET).to_string()
    }

    /// Rebuild `original` with this path, keeping its scheme, authority and query.
    ///
    /// Fails only when the rebuilt URI exceeds the maximum URI length.
    pub fn to_uri(&self, original: &Uri) -> Result<Uri, axum::http::Error> {
        let mut path_and_query = self.escaped_path();
        if let Some(query) = original.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        let mut parts = original.clone().into_parts();
        parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
        Ok(Uri::from_parts(parts)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_leading_slash() {
        assert_eq!(ensure_leading_slash(""), "/");
        assert_eq!(ensure_leading_slash("users"), "/users");
        assert_eq!(ensure_leading_slash("/users"), "/users");
        assert_eq!(ensure_leading_slash("///users"), "/users");
    }

    #[test]
    fn test_ensure_leading_slash_idempotent() {
        for input in ["", "/", "a/b", "//a", "/a/"] {
            let once = ensure_leading_slash(input);
            assert_eq!(ensure_leading_slash(&once), once);
        }
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("/api/users", "/api"), "/users");
        assert_eq!(strip_prefix("/api/", "/api"), "/");
        assert_eq!(strip_prefix("/api", "/api"), "/");
        assert_eq!(strip_prefix("/apiextra", "/api"), "/extra");
        // Only the front occurrence is removed.
        assert_eq!(strip_prefix("/api/api", "/api"), "/api");
        // Not present: only the leading slash is normalized.
        assert_eq!(strip_prefix("/other", "/api"), "/other");
    }

    #[test]
    fn test_from_encoded_plain_path_has_no_raw() {
        let path = RequestPath::from_encoded("/api/users");
        assert_eq!(path, RequestPath::new("/api/users"));
    }

    #[test]
    fn test_from_encoded_keeps_raw() {
        let path = RequestPath::from_encoded("/api/hello%20world");
        assert_eq!(path.path(), "/api/hello world");
        assert_eq!(path.raw_path(), Some("/api/hello%20world"));
    }

    #[test]
    fn test_strip_rewrites_raw_independently() {
        let mut path = RequestPath::with_raw("/api/a b", "/api/a%20b");
        path.strip("/api");
        assert_eq!(path.path(), "/a b");
        assert_eq!(path.raw_path(), Some("/a%20b"));
        assert_eq!(path.escaped_path(), "/a%20b");
    }

    #[test]
    fn test_strip_leaves_empty_raw_alone() {
        let mut path = RequestPath::with_raw("/api/x", "");
        path.strip("/api");
        assert_eq!(path.path(), "/x");
        assert_eq!(path.raw_path(), Some(""));
    }

    #[test]
    fn test_escaped_path_falls_back_when_raw_is_stale() {
        // The decoded prefix is not present in the raw form, so the raw
        // path keeps the prefix and no longer matches the decoded path.
        let mut path = RequestPath::from_encoded("/my%20app/x");
        path.strip("/my app");
        assert_eq!(path.path(), "/x");
        assert_eq!(path.raw_path(), Some("/my%20app/x"));
        assert_eq!(path.escaped_path(), "/x");
    }

    #[test]
    fn test_escaped_path_encodes_reserved_characters() {
        let path = RequestPath::new("/a b/50%?");
        assert_eq!(path.escaped_path(), "/a%20b/50%25%3F");
    }

    #[test]
    fn test_to_uri_keeps_query_and_authority() {
        let original: Uri = "http://example.com/api/items?page=2".parse().unwrap();
        let mut path = RequestPath::from_uri(&original);
        path.strip("/api");

        let uri = path.to_uri(&original).unwrap();
        assert_eq!(uri.to_string(), "http://example.com/items?page=2");
    }

    #[test]
    fn test_to_uri_origin_form() {
        let original: Uri = "/api/".parse().unwrap();
        let mut path = RequestPath::from_uri(&original);
        path.strip("/api");

        let uri = path.to_uri(&original).unwrap();
        assert_eq!(uri, "/");
    }

    #[test]
    fn test_invalid_utf8_escape_survives_strip() {
        let mut path = RequestPath::from_encoded("/api/%FF");
        assert_eq!(path.as_bytes(), b"/api/\xFF");
        assert_eq!(path.path(), "/api/\u{FFFD}");

        path.strip("/api");
        assert_eq!(path.as_bytes(), b"/\xFF");
        assert_eq!(path.escaped_path(), "/%FF");
    }

    #[test]
    fn test_invalid_utf8_escape_reencoded_from_bytes() {
        // Stale raw path: the decoded bytes are encoded again, not their lossy text.
        let mut path = RequestPath::from_encoded("/my%20app/%FF%FEx");
        path.strip("/my app");
        assert_eq!(path.as_bytes(), b"/\xFF\xFEx");
        assert_eq!(path.escaped_path(), "/%FF%FEx");
    }

    #[test]
    fn test_serializes_lossy_path() {
        let path = RequestPath::from_encoded("/a%FF");
        let value = serde_json::to_value(&path).unwrap();
        assert_eq!(value["path"], "/a\u{FFFD}");
        assert_eq!(value["raw_path"], "/a%FF");
    }

    #[test]
    fn test_escaped_path_is_always_a_valid_uri_path() {
        let original: Uri = "/api/x?q=1".parse().unwrap();
        for decoded in ["/a b", "/\"{}\"", "/<>`", "/50%", "/q?#f", "/tab\there", "/é/ü", "/\\^|[]"] {
            let uri = RequestPath::new(decoded).to_uri(&original).unwrap();
            assert_eq!(uri.query(), Some("q=1"), "{decoded}");
            let decoded_again: Vec<u8> = percent_decode_str(uri.path()).collect();
            assert_eq!(decoded_again, decoded.as_bytes(), "{decoded}");
        }
    }

    #[test]
    fn test_to_uri_fails_past_maximum_length() {
        // Each `{` is valid raw but re-encodes to three bytes.
        let encoded = format!("/my%20app/{}", "{".repeat(30_000));
        let original: Uri = encoded.parse().unwrap();
        let mut path = RequestPath::from_uri(&original);
        path.strip("/my app");
        assert!(path.to_uri(&original).is_err());
    }
}

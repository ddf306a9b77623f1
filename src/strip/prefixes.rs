//! Ordered prefix matching.
//!
//! # Design Decisions
//! - First match wins, in configuration order
//! - Immutable after construction (shared via `Arc` without locks)
//! - Literal `starts_with` matching by default; segment-aware matching is opt-in

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::strip::path::RequestPath;

/// How a prefix is compared against a request path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Plain string prefix: `/api` matches `/api`, `/api/x` and `/apiextra`.
    #[default]
    Literal,

    /// Prefix must end on a path segment boundary: `/api` matches `/api` and
    /// `/api/x` but not `/apiextra`.
    SegmentBoundary,
}

impl MatchMode {
    /// Returns true if the decoded `path` is eligible for stripping `prefix`.
    pub fn matches(self, path: &[u8], prefix: &str) -> bool {
        let Some(rest) = path.strip_prefix(prefix.as_bytes()) else {
            return false;
        };
        match self {
            MatchMode::Literal => true,
            MatchMode::SegmentBoundary => {
                rest.is_empty() || rest.starts_with(b"/") || prefix.is_empty() || prefix.ends_with('/')
            }
        }
    }
}

/// Outcome of a successful match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rewrite {
    /// The matched prefix with surrounding whitespace trimmed.
    pub prefix: String,

    /// True iff the original path was exactly the prefix plus `/`.
    pub trailing_slash: bool,

    /// The path with the prefix removed.
    pub path: RequestPath,
}

/// Ordered list of prefixes to strip.
#[derive(Debug, Clone)]
pub struct PrefixList {
    prefixes: Arc<[String]>,
    mode: MatchMode,
}

impl PrefixList {
    /// Create a list using literal matching.
    ///
    /// Prefixes are kept as given: an empty prefix matches every path.
    pub fn new<I, P>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::<String>::into).collect(),
            mode: MatchMode::Literal,
        }
    }

    /// Set the match mode.
    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn match_mode(&self) -> MatchMode {
        self.mode
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }

    /// Returns the first configured prefix that the decoded `path` starts with.
    pub fn find(&self, path: &[u8]) -> Option<&str> {
        self.iter().find(|prefix| self.mode.matches(path, prefix))
    }

    /// Match `path` against the list and compute the rewritten path.
    ///
    /// Returns `None` when no prefix matches.
    pub fn rewrite(&self, path: &RequestPath) -> Option<Rewrite> {
        let prefix = self.find(path.as_bytes())?;
        let trailing_slash = path.as_bytes().strip_prefix(prefix.as_bytes()) == Some(b"/".as_slice());

        let mut rewritten = path.clone();
        rewritten.strip(prefix);

        Some(Rewrite {
            prefix: prefix.trim().to_string(),
            trailing_slash,
            path: rewritten,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(prefixes: &[&str], path: &str) -> Option<Rewrite> {
        PrefixList::new(prefixes.iter().copied()).rewrite(&RequestPath::new(path))
    }

    #[test]
    fn test_rewrite_nested_path() {
        let rw = rewrite(&["/api"], "/api/v1/items").unwrap();
        assert_eq!(rw.prefix, "/api");
        assert_eq!(rw.path.path(), "/v1/items");
        assert!(!rw.trailing_slash);
    }

    #[test]
    fn test_rewrite_trailing_slash() {
        let rw = rewrite(&["/api"], "/api/").unwrap();
        assert_eq!(rw.path.path(), "/");
        assert!(rw.trailing_slash);
    }

    #[test]
    fn test_rewrite_exact_prefix_has_no_trailing_slash() {
        let rw = rewrite(&["/api"], "/api").unwrap();
        assert_eq!(rw.path.path(), "/");
        assert!(!rw.trailing_slash);
    }

    #[test]
    fn test_rewrite_deeper_path_has_no_trailing_slash() {
        let rw = rewrite(&["/api"], "/api/x/").unwrap();
        assert_eq!(rw.path.path(), "/x/");
        assert!(!rw.trailing_slash);
    }

    #[test]
    fn test_no_match() {
        assert!(rewrite(&["/api"], "/other").is_none());
        assert!(rewrite(&[], "/api").is_none());
    }

    #[test]
    fn test_literal_match_has_no_segment_boundary() {
        let rw = rewrite(&["/api"], "/apiextra").unwrap();
        assert_eq!(rw.path.path(), "/extra");
        assert!(!rw.trailing_slash);
    }

    #[test]
    fn test_first_match_wins() {
        let rw = rewrite(&["/foo", "/bar"], "/bar/x").unwrap();
        assert_eq!(rw.prefix, "/bar");
        assert_eq!(rw.path.path(), "/x");

        // Overlapping prefixes: the earlier one dominates even if shorter.
        let rw = rewrite(&["/api", "/api/v1"], "/api/v1/users").unwrap();
        assert_eq!(rw.prefix, "/api");
        assert_eq!(rw.path.path(), "/v1/users");
    }

    #[test]
    fn test_empty_prefix_matches_everything() {
        let rw = rewrite(&[""], "/anything").unwrap();
        assert_eq!(rw.prefix, "");
        assert_eq!(rw.path.path(), "/anything");

        let rw = rewrite(&[""], "/").unwrap();
        assert!(rw.trailing_slash);
    }

    #[test]
    fn test_prefix_is_trimmed_for_annotation_only() {
        let rw = rewrite(&["/api "], "/api /x").unwrap();
        assert_eq!(rw.prefix, "/api");
        assert_eq!(rw.path.path(), "/x");

        // The untrimmed prefix is what gets matched.
        assert!(rewrite(&["/api "], "/api/x").is_none());
    }

    #[test]
    fn test_raw_path_exact_prefix() {
        let list = PrefixList::new(["/api"]);
        let rw = list.rewrite(&RequestPath::with_raw("/api", "/api")).unwrap();
        assert_eq!(rw.path.path(), "/");
        assert_eq!(rw.path.raw_path(), Some("/"));
        assert!(!rw.trailing_slash);
    }

    #[test]
    fn test_matching_uses_decoded_path() {
        let list = PrefixList::new(["/my app"]);
        let rw = list.rewrite(&RequestPath::from_encoded("/my%20app/x")).unwrap();
        assert_eq!(rw.prefix, "/my app");
        assert_eq!(rw.path.path(), "/x");
    }

    #[test]
    fn test_segment_boundary_mode() {
        let list = PrefixList::new(["/api"]).with_match_mode(MatchMode::SegmentBoundary);
        assert_eq!(list.find(b"/api"), Some("/api"));
        assert_eq!(list.find(b"/api/"), Some("/api"));
        assert_eq!(list.find(b"/api/users"), Some("/api"));
        assert_eq!(list.find(b"/apiextra"), None);

        let list = PrefixList::new(["/api/"]).with_match_mode(MatchMode::SegmentBoundary);
        assert_eq!(list.find(b"/api/users"), Some("/api/"));
    }

    #[test]
    fn test_segment_boundary_falls_through_to_later_prefix() {
        let list = PrefixList::new(["/api", "/apiextra"]).with_match_mode(MatchMode::SegmentBoundary);
        let rw = list.rewrite(&RequestPath::new("/apiextra/x")).unwrap();
        assert_eq!(rw.prefix, "/apiextra");
        assert_eq!(rw.path.path(), "/x");
    }

    #[test]
    fn test_matches_encoded_bytes_that_are_not_utf8() {
        let list = PrefixList::new(["/api"]);
        let rw = list.rewrite(&RequestPath::from_encoded("/api/%FF")).unwrap();
        assert_eq!(rw.path.as_bytes(), b"/\xFF");
        assert_eq!(rw.path.escaped_path(), "/%FF");
        assert!(!rw.trailing_slash);
    }

    #[test]
    fn test_match_mode_deserializes_from_snake_case() {
        #[derive(Deserialize)]
        struct Doc {
            mode: MatchMode,
        }
        let doc: Doc = toml::from_str(r#"mode = "segment_boundary""#).unwrap();
        assert_eq!(doc.mode, MatchMode::SegmentBoundary);
    }
}

//! Prefix-stripping middleware.
//!
//! # Responsibilities
//! - Find the first configured prefix the request path starts with
//! - Rewrite the request URI without it (decoded and raw path)
//! - Record the stripped prefix in the request extensions and in
//!   `X-Forwarded-Prefix`
//! - Delegate to the inner service, or answer `404` when nothing matched

use std::task::{Context, Poll};

use axum::extract::OriginalUri;
use axum::http::{HeaderValue, Request, Response, StatusCode};
use futures_util::future::{self, Either, Ready};
use tower::{Layer, Service};

use crate::observability::metrics;
use crate::strip::extension::{StrippedPrefix, X_FORWARDED_PREFIX};
use crate::strip::path::RequestPath;
use crate::strip::prefixes::{MatchMode, PrefixList};
use crate::strip::slot::DownstreamSlot;

/// Layer that applies [`StripPrefix`].
#[derive(Debug, Clone)]
pub struct StripPrefixLayer {
    prefixes: PrefixList,
}

impl StripPrefixLayer {
    /// Strip the given prefixes, first match wins.
    pub fn new<I, P>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self::from_list(PrefixList::new(prefixes))
    }

    pub fn from_list(prefixes: PrefixList) -> Self {
        Self { prefixes }
    }

    /// Set how prefixes are matched against the path.
    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.prefixes = self.prefixes.with_match_mode(mode);
        self
    }
}

impl<S> Layer<S> for StripPrefixLayer {
    type Service = StripPrefix<S>;

    fn layer(&self, inner: S) -> Self::Service {
        StripPrefix::new(inner, self.prefixes.clone())
    }
}

/// Middleware that strips a configured path prefix before calling `inner`.
///
/// Requests whose path starts with none of the prefixes get an empty
/// `404 Not Found` and never reach `inner`.
#[derive(Debug, Clone)]
pub struct StripPrefix<S> {
    inner: S,
    prefixes: PrefixList,
}

impl<S> StripPrefix<S> {
    pub fn new(inner: S, prefixes: PrefixList) -> Self {
        Self { inner, prefixes }
    }

}

impl<S> StripPrefix<DownstreamSlot<S>> {
    /// A stripper whose downstream is bound later with
    /// [`set_downstream`](Self::set_downstream).
    ///
    /// Requests that match before a downstream is bound fail with
    /// [`SlotError::Unbound`](crate::strip::SlotError::Unbound).
    pub fn unbound(prefixes: PrefixList) -> Self {
        Self::new(DownstreamSlot::unbound(), prefixes)
    }

    /// Bind or replace the downstream handler for this stripper and all its clones.
    pub fn set_downstream(&self, downstream: S) {
        self.inner.set(downstream);
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for StripPrefix<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: Default,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Either<S::Future, Ready<Result<Response<ResBody>, S::Error>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let path = RequestPath::from_uri(request.uri());
        let Some(rewrite) = self.prefixes.rewrite(&path) else {
            tracing::debug!(path = %path.path(), "No prefix matched");
            metrics::record_not_found();
            return Either::Right(future::ready(Ok(empty_response(StatusCode::NOT_FOUND))));
        };

        // `escaped_path` only yields URI-safe characters; re-encoding can
        // still push a long path over the URI length limit.
        let uri = match rewrite.path.to_uri(request.uri()) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(prefix = %rewrite.prefix, error = %e, "Rewritten URI is too long");
                metrics::record_not_found();
                return Either::Right(future::ready(Ok(empty_response(StatusCode::NOT_FOUND))));
            }
        };

        tracing::debug!(
            prefix = %rewrite.prefix,
            path = %path.path(),
            rewritten = %uri,
            trailing_slash = rewrite.trailing_slash,
            "Stripped prefix"
        );
        metrics::record_stripped(&rewrite.prefix);

        if request.extensions().get::<OriginalUri>().is_none() {
            let original = request.uri().clone();
            request.extensions_mut().insert(OriginalUri(original));
        }
        *request.uri_mut() = uri;

        match HeaderValue::from_bytes(rewrite.prefix.as_bytes()) {
            Ok(value) => {
                request.headers_mut().append(X_FORWARDED_PREFIX, value);
            }
            Err(_) => {
                tracing::warn!(prefix = %rewrite.prefix, "Prefix is not a valid header value, X-Forwarded-Prefix not set");
            }
        }

        request.extensions_mut().insert(StrippedPrefix {
            prefix: rewrite.prefix,
            trailing_slash: rewrite.trailing_slash,
        });

        Either::Left(self.inner.call(request))
    }
}

fn empty_response<B: Default>(status: StatusCode) -> Response<B> {
    let mut response = Response::new(B::default());
    *response.status_mut() = status;
    response
}

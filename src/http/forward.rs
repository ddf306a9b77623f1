//! Upstream forwarding.
//!
//! # Responsibilities
//! - Point the (already rewritten) request URI at the upstream
//! - Send it with a pooled hyper-util client
//! - Map transport failures to `502 Bad Gateway`
//!
//! # Design Decisions
//! - Headers are forwarded as-is, including `X-Forwarded-Prefix`
//! - Bodies are streamed, never buffered

use std::convert::Infallible;
use std::str::FromStr;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::uri::{Authority, InvalidUri, PathAndQuery, Scheme};
use axum::http::{Request, Response, StatusCode, Uri};
use futures_util::future::BoxFuture;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tower::Service;

use crate::http::request::RequestIdExt;
use crate::observability::metrics;

/// Forwards requests to a single upstream over HTTP.
#[derive(Clone, Debug)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
    authority: Authority,
}

impl Forwarder {
    /// Create a forwarder for `address` (e.g. `"127.0.0.1:3000"`).
    pub fn new(address: &str) -> Result<Self, InvalidUri> {
        let authority = Authority::from_str(address)?;
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Ok(Self { client, authority })
    }

    fn upstream_uri(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let mut parts = uri.clone().into_parts();
        parts.scheme = Some(Scheme::HTTP);
        parts.authority = Some(self.authority.clone());
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        Ok(Uri::from_parts(parts)?)
    }

    async fn forward(self, mut request: Request<Body>) -> Response<Body> {
        let request_id = request.request_id().to_string();

        match self.upstream_uri(request.uri()) {
            Ok(uri) => *request.uri_mut() = uri,
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
                return status_response(StatusCode::BAD_GATEWAY);
            }
        }

        tracing::debug!(
            request_id = %request_id,
            method = %request.method(),
            uri = %request.uri(),
            "Forwarding request"
        );

        match self.client.request(request).await {
            Ok(response) => {
                metrics::record_upstream(Some(response.status().as_u16()));
                response.map(Body::new)
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, upstream = %self.authority, error = %e, "Upstream error");
                metrics::record_upstream(None);
                status_response(StatusCode::BAD_GATEWAY)
            }
        }
    }
}

impl Service<Request<Body>> for Forwarder {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response<Body>, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { Ok(this.forward(request).await) })
    }
}

fn status_response(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

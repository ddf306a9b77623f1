//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use strip_prefix_proxy::config::StripConfig;
use strip_prefix_proxy::http::{HttpServer, ServerError};
use strip_prefix_proxy::lifecycle::Shutdown;
use strip_prefix_proxy::strip::forwarded_prefixes;

/// A backend that answers every request with a JSON description of what it received.
pub struct EchoBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl EchoBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub async fn start_echo_backend() -> EchoBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    let app = Router::new().fallback(move |request: Request| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let headers = request.headers();
            Json(json!({
                "path": request.uri().path(),
                "query": request.uri().query(),
                "forwarded_prefix": forwarded_prefixes(headers),
                "request_id": headers.get("x-request-id").and_then(|v| v.to_str().ok()),
            }))
        }
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    EchoBackend { addr, hits }
}

/// A proxy running on an ephemeral port.
#[allow(dead_code)]
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<StripConfig>,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Config forwarding `prefixes` to `backend`.
pub fn config_for(backend: &EchoBackend, prefixes: &[&str]) -> StripConfig {
    let mut config = StripConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.address = backend.addr.to_string();
    config.strip.prefixes = prefixes.iter().map(|p| p.to_string()).collect();
    config
}

pub async fn start_proxy(config: StripConfig) -> TestProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();

    let handle = tokio::spawn(async move { server.run(listener, config_updates, server_shutdown).await });

    TestProxy {
        addr,
        shutdown,
        updates,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// GET `path` through the proxy, returning the status and the echoed JSON (if any).
pub async fn get(proxy: &TestProxy, path: &str) -> (u16, Option<Value>) {
    let res = client().get(proxy.url(path)).send().await.expect("proxy unreachable");
    let status = res.status().as_u16();
    (status, res.json::<Value>().await.ok())
}

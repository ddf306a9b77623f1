//! Late-bound downstream handler.
//!
//! # Design Decisions
//! - Lock-free reads via `ArcSwapOption`; `set` may race with in-flight requests
//! - Each request runs on the handler loaded when it was called; in-flight
//!   requests finish on the handler they started with
//! - Calling an unbound slot fails fast with [`SlotError::Unbound`]

use std::sync::Arc;
use std::task::{Context, Poll};

use arc_swap::ArcSwapOption;
use futures_util::future::{self, BoxFuture, FutureExt};
use thiserror::Error;
use tower::{Service, ServiceExt};

/// Errors returned by [`DownstreamSlot`].
#[derive(Debug, Error)]
pub enum SlotError<E> {
    /// No handler has been bound yet.
    #[error("downstream handler is not bound")]
    Unbound,

    /// The bound handler failed.
    #[error("downstream handler failed")]
    Downstream(#[source] E),
}

/// A shared, atomically replaceable downstream service.
///
/// Clones share the same slot.
pub struct DownstreamSlot<S> {
    current: Arc<ArcSwapOption<S>>,
}

impl<S> DownstreamSlot<S> {
    /// An empty slot.
    pub fn unbound() -> Self {
        Self {
            current: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// A slot already holding `service`.
    pub fn new(service: S) -> Self {
        Self {
            current: Arc::new(ArcSwapOption::from_pointee(service)),
        }
    }

    /// Bind (or rebind) the downstream service.
    pub fn set(&self, service: S) {
        self.current.store(Some(Arc::new(service)));
    }

    /// Unbind the downstream service.
    pub fn clear(&self) {
        self.current.store(None);
    }

    pub fn is_bound(&self) -> bool {
        self.current.load().is_some()
    }
}

impl<S> Clone for DownstreamSlot<S> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
        }
    }
}

impl<S> Default for DownstreamSlot<S> {
    fn default() -> Self {
        Self::unbound()
    }
}

impl<S> std::fmt::Debug for DownstreamSlot<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownstreamSlot")
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl<S, R> Service<R> for DownstreamSlot<S>
where
    S: Service<R> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    R: Send + 'static,
{
    type Response = S::Response;
    type Error = SlotError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, SlotError<S::Error>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness is checked on the clone taken in `call`.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: R) -> Self::Future {
        let Some(current) = self.current.load_full() else {
            tracing::error!("Request reached an unbound downstream handler");
            return future::ready(Err(SlotError::Unbound)).boxed();
        };

        S::clone(&current)
            .oneshot(request)
            .map(|result| result.map_err(SlotError::Downstream))
            .boxed()
    }
}

//! Service routing: dispatches a [`ServiceRequest`] to its handler by `(project, method)`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use scene_core::Value;
use tower::util::BoxCloneService;
use tower::{Service, ServiceExt};
use tracing::{info_span, Instrument};

use super::local::RpcError;
use crate::scene::Scene;

/// A remote call as seen by the receiving side.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    /// Scene of the receiving flow, bound to the caller's reconstructed operation.
    pub scene: Arc<Scene>,
    /// Project the call was addressed to.
    pub project: String,
    /// Method name, exactly as the caller spelled it.
    pub method: String,
    /// Positional arguments, unvalidated.
    pub args: Vec<Value>,
}

// ---------------------------------------------------------------------------
// BoxedHandler
// ---------------------------------------------------------------------------

/// A type-erased, cloneable Tower service handling one method.
type BoxedHandler = BoxCloneService<ServiceRequest, Value, anyhow::Error>;

// ---------------------------------------------------------------------------
// ServiceRouter
// ---------------------------------------------------------------------------

/// Routes requests to handlers keyed by project and method name.
///
/// Each handler is a `tower::Service<ServiceRequest>`. A fresh clone of the
/// handler serves each request, so concurrent calls never contend on
/// readiness. Unregistered `(project, method)` pairs fail with
/// [`RpcError::UnknownMethod`].
#[derive(Default)]
pub struct ServiceRouter {
    handlers: HashMap<(String, String), Mutex<BoxedHandler>>,
}

impl ServiceRouter {
    /// Create a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `method` of `project`, replacing any previous one.
    pub fn register<S>(&mut self, project: impl Into<String>, method: impl Into<String>, service: S)
    where
        S: Service<ServiceRequest, Response = Value, Error = anyhow::Error> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        self.handlers.insert(
            (project.into(), method.into()),
            Mutex::new(BoxCloneService::new(service)),
        );
    }

    /// Register an async function as the handler for `method` of `project`.
    pub fn register_fn<F, Fut>(&mut self, project: impl Into<String>, method: impl Into<String>, f: F)
    where
        F: Fn(ServiceRequest) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register(project, method, tower::service_fn(f));
    }

    /// Returns `true` if a handler exists for `method` of `project`.
    #[must_use]
    pub fn contains(&self, project: &str, method: &str) -> bool {
        self.handlers
            .contains_key(&(project.to_string(), method.to_string()))
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the handler registered for the request's project and method.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::UnknownMethod`] when no handler matches; handler
    /// failures are returned unchanged.
    pub async fn dispatch(&self, request: ServiceRequest) -> anyhow::Result<Value> {
        let key = (request.project.clone(), request.method.clone());
        let Some(handler) = self.handlers.get(&key).map(|h| h.lock().clone()) else {
            return Err(RpcError::UnknownMethod {
                project: key.0,
                method: key.1,
            }
            .into());
        };

        let span = info_span!(
            "rpc",
            project = %key.0,
            method = %key.1,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        async move {
            let start = Instant::now();
            let result = handler.oneshot(request).await;
            let duration_ms = start.elapsed().as_millis();
            let outcome = if result.is_ok() { "ok" } else { "error" };

            #[allow(clippy::cast_possible_truncation)]
            let duration_ms = duration_ms as u64;
            tracing::Span::current().record("duration_ms", duration_ms);
            tracing::Span::current().record("outcome", outcome);
            tracing::debug!(duration_ms, outcome, "rpc handled");
            result
        }
        .instrument(span)
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! In-process [`ServiceProtocol`] that behaves like a remote hop.
//!
//! Every call serializes the caller's [`TraceContext`] and arguments to
//! `MsgPack` and rebuilds them on the receiving side, so handlers observe
//! exactly what would survive a network boundary: trace identifiers and
//! baggage arrive, props and hooks do not.

use std::sync::Arc;

use async_trait::async_trait;
use scene_core::{Operation, TraceContext, Value};

use super::config::LocalServiceConfig;
use super::router::{ServiceRequest, ServiceRouter};
use crate::scene::{Scene, SceneConfig};
use crate::traits::{ServiceProtocol, StoragePort};

/// Failures raised by the protocol itself rather than by a handler.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("no handler for `{method}` in project `{project}`")]
    UnknownMethod { project: String, method: String },

    #[error("call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("rpc codec error: {0}")]
    Codec(String),
}

struct Inner {
    router: ServiceRouter,
    storage: Arc<dyn StoragePort>,
    config: LocalServiceConfig,
}

/// Remote-call port that dispatches to handlers in the same process.
///
/// Receiving Scenes are bound to `storage` and to this protocol, so handlers
/// may read, write, and call further services within the same trace.
#[derive(Clone)]
pub struct LocalServiceProtocol {
    inner: Arc<Inner>,
}

impl LocalServiceProtocol {
    #[must_use]
    pub fn new(
        router: ServiceRouter,
        storage: Arc<dyn StoragePort>,
        config: LocalServiceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                router,
                storage,
                config,
            }),
        }
    }

    #[must_use]
    pub fn router(&self) -> &ServiceRouter {
        &self.inner.router
    }

    #[must_use]
    pub fn config(&self) -> &LocalServiceConfig {
        &self.inner.config
    }

    /// Decodes a wire request and binds it to a fresh Scene for `project`.
    fn receive(
        &self,
        project: &str,
        method: &str,
        envelope: &[u8],
        payload: &[u8],
    ) -> anyhow::Result<ServiceRequest> {
        let ctx = TraceContext::from_msgpack(envelope)?;
        let args: Vec<Value> =
            rmp_serde::from_slice(payload).map_err(|e| RpcError::Codec(e.to_string()))?;
        let scene = Scene::with_config(
            Arc::new(Operation::from_trace_context(ctx)),
            Arc::clone(&self.inner.storage),
            Arc::new(self.clone()),
            SceneConfig::with_project(project),
        );
        Ok(ServiceRequest {
            scene: Arc::new(scene),
            project: project.to_string(),
            method: method.to_string(),
            args,
        })
    }
}

impl std::fmt::Debug for LocalServiceProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalServiceProtocol")
            .field("handlers", &self.inner.router.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, RpcError> {
    rmp_serde::to_vec_named(value).map_err(|e| RpcError::Codec(e.to_string()))
}

#[async_trait]
impl ServiceProtocol for LocalServiceProtocol {
    async fn call(
        &self,
        scene: &Scene,
        project: &str,
        method: &str,
        args: Vec<Value>,
    ) -> anyhow::Result<Value> {
        let envelope = scene.operation().trace_context().to_msgpack()?;
        let payload = encode(&args)?;

        let request = self.receive(project, method, &envelope, &payload)?;
        let dispatch = self.inner.router.dispatch(request);
        let value = match self.inner.config.call_timeout_ms {
            Some(timeout_ms) => {
                let limit = std::time::Duration::from_millis(timeout_ms);
                tokio::time::timeout(limit, dispatch)
                    .await
                    .map_err(|_elapsed| RpcError::Timeout { timeout_ms })??
            }
            None => dispatch.await?,
        };

        let reply = encode(&value)?;
        Ok(rmp_serde::from_slice(&reply).map_err(|e| RpcError::Codec(e.to_string()))?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

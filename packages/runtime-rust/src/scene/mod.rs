//! The Scene: execution context of one independent asynchronous flow.
//!
//! A [`Scene`] binds one shared [`Operation`] to a [`StoragePort`] and a
//! [`ServiceProtocol`] and is passed explicitly through the call graph of the
//! flow. All data access ([`data`]) and remote calls ([`services`]) go through
//! it, so trace identity, subscription tracking, and change notification are
//! side effects of ordinary use.
//!
//! Create one Scene per independent flow: one per incoming request on a
//! server; on a client, one per read-evaluation pass and one per
//! write/interaction pass ([`Scene::fork`]).

pub mod config;
pub mod data;
pub mod services;
pub mod subscribers;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use scene_core::Operation;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::error::SceneError;
use crate::traits::{ServiceProtocol, StoragePort};

pub use config::{default_project, set_default_project, SceneConfig};
pub use data::{FnView, Query, View};
pub use services::ServiceClient;
pub use subscribers::{RecordingSubscriber, SubscriberId, SubscriberSet};

/// Hook invoked with the name of a resource that changed.
pub type ChangeHook = Arc<dyn Fn(&str) + Send + Sync>;

fn noop_change_hook() -> ChangeHook {
    Arc::new(|_: &str| {})
}

/// Per-flow execution context.
///
/// The operation, both ports, and the default project are fixed at
/// construction. The subscriber set and the change hook may be changed at any
/// time through a shared reference.
pub struct Scene {
    operation: Arc<Operation>,
    database: Arc<dyn StoragePort>,
    service_protocol: Arc<dyn ServiceProtocol>,
    subscribers: SubscriberSet,
    notify_change: RwLock<ChangeHook>,
    default_project: String,
}

impl Scene {
    /// Creates a Scene using [`SceneConfig::default`].
    #[must_use]
    pub fn new(
        operation: Arc<Operation>,
        database: Arc<dyn StoragePort>,
        service_protocol: Arc<dyn ServiceProtocol>,
    ) -> Self {
        Self::with_config(operation, database, service_protocol, SceneConfig::default())
    }

    /// Creates a Scene with explicit configuration.
    #[must_use]
    pub fn with_config(
        operation: Arc<Operation>,
        database: Arc<dyn StoragePort>,
        service_protocol: Arc<dyn ServiceProtocol>,
        config: SceneConfig,
    ) -> Self {
        tracing::trace!(
            trace_id = %operation.trace_id(),
            span_id = %operation.span_id(),
            project = %config.default_project,
            "scene created"
        );
        Self {
            operation,
            database,
            service_protocol,
            subscribers: SubscriberSet::new(),
            notify_change: RwLock::new(noop_change_hook()),
            default_project: config.default_project,
        }
    }

    /// Creates a sibling Scene for another independent flow of the same operation.
    ///
    /// Shares the operation, both ports, and the default project. The new Scene
    /// starts with no subscribers and the default (no-op) change hook.
    #[must_use]
    pub fn fork(&self) -> Scene {
        self.derive(Arc::clone(&self.operation))
    }

    /// Creates a Scene bound to a child operation of this Scene's operation.
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Scene {
        self.derive(Arc::new(self.operation.child(name)))
    }

    fn derive(&self, operation: Arc<Operation>) -> Scene {
        Scene::with_config(
            operation,
            Arc::clone(&self.database),
            Arc::clone(&self.service_protocol),
            SceneConfig::with_project(self.default_project.clone()),
        )
    }

    #[must_use]
    pub fn operation(&self) -> &Arc<Operation> {
        &self.operation
    }

    #[must_use]
    pub fn database(&self) -> &Arc<dyn StoragePort> {
        &self.database
    }

    #[must_use]
    pub fn service_protocol(&self) -> &Arc<dyn ServiceProtocol> {
        &self.service_protocol
    }

    /// Project targeted by [`use_services(None)`](Self::use_services).
    #[must_use]
    pub fn default_project(&self) -> &str {
        &self.default_project
    }

    /// The listeners registered on this Scene.
    #[must_use]
    pub fn subscribers(&self) -> &SubscriberSet {
        &self.subscribers
    }

    /// Tells every registered subscriber that this flow read `resource`.
    pub fn subscribe(&self, resource: &str) {
        let notified = self.subscribers.broadcast(resource);
        tracing::trace!(resource, notified, "subscribe broadcast");
    }

    /// Replaces the change hook.
    pub fn set_notify_change(&self, hook: ChangeHook) {
        *self.notify_change.write() = hook;
    }

    /// Announces that `resource` changed by invoking the change hook.
    ///
    /// The data facade calls this after the storage port confirmed a write.
    pub fn notify_change(&self, resource: &str) {
        let hook = Arc::clone(&self.notify_change.read());
        tracing::trace!(resource, "notify change");
        hook(resource);
    }

    /// Starts an asynchronous task on behalf of this Scene's operation.
    ///
    /// Invokes the operation's task-started hook with `task_name`, then spawns
    /// `future` on the tokio runtime inside the operation's tracing span.
    pub fn spawn<F>(&self, task_name: &str, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.operation.report_task_started(task_name);
        tracing::debug!(task = task_name, "spawning task");
        tokio::spawn(future.instrument(self.operation.tracing_span()))
    }

    /// Logs `err`, passes it to the operation's error hook, and returns it.
    pub(crate) fn fail(&self, err: SceneError) -> SceneError {
        tracing::warn!(
            trace_id = %self.operation.trace_id(),
            span_id = %self.operation.span_id(),
            kind = err.kind(),
            error = %err,
            "scene operation failed"
        );
        self.operation.report_error(&err);
        err
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("operation", &self.operation)
            .field("subscribers", &self.subscribers)
            .field("default_project", &self.default_project)
            .finish_non_exhaustive()
    }
}

/// Cooperative delay of `ms` milliseconds. Not cancellable by the Scene.
pub async fn sleep(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

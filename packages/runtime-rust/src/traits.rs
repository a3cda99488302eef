use async_trait::async_trait;
use scene_core::{Fields, Record, RecordClass, Value};

use crate::scene::Scene;

/// Declarative read/write hints attached to a raw SQL call.
///
/// Hints carry no behavioral guarantee: a storage port may use them for cache
/// invalidation or read/write splitting. The Scene uses them to subscribe to
/// the read classes and announce changes to the write classes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlHints {
    /// Record classes the statement reads.
    pub read: Vec<RecordClass>,
    /// Record classes the statement writes.
    pub write: Vec<RecordClass>,
}

impl SqlHints {
    /// Hints for a statement that only reads `classes`.
    #[must_use]
    pub fn reads(classes: impl IntoIterator<Item = RecordClass>) -> Self {
        Self {
            read: classes.into_iter().collect(),
            write: Vec::new(),
        }
    }

    /// Hints for a statement that writes `classes`.
    #[must_use]
    pub fn writes(classes: impl IntoIterator<Item = RecordClass>) -> Self {
        Self {
            read: Vec::new(),
            write: classes.into_iter().collect(),
        }
    }
}

/// Pluggable persistence backend bound to a Scene.
/// Implementations: in-memory (tests, demo), SQL databases (host application).
///
/// Every call receives the Scene it is issued from, so implementations can read
/// the trace identity or props of the current operation.
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Create a record; returns it with any storage-assigned fields (e.g. primary key).
    async fn insert(&self, scene: &Scene, class: &RecordClass, fields: Fields)
        -> anyhow::Result<Record>;

    /// Overwrite an existing record, located by its primary key.
    async fn update(&self, scene: &Scene, record: &Record) -> anyhow::Result<()>;

    /// Remove an existing record, located by its primary key.
    async fn delete(&self, scene: &Scene, record: &Record) -> anyhow::Result<()>;

    /// Records whose fields equal every entry of `example` (equality, implicit AND).
    async fn query_by_example(
        &self,
        scene: &Scene,
        class: &RecordClass,
        example: &Fields,
    ) -> anyhow::Result<Vec<Record>>;

    /// Run a raw statement with bound variables.
    async fn execute_sql(
        &self,
        scene: &Scene,
        sql: &str,
        vars: &[Value],
        hints: &SqlHints,
    ) -> anyhow::Result<Vec<Fields>>;
}

/// Pluggable remote-call backend bound to a Scene.
/// Implementations: in-process dispatch (tests, demo), HTTP or `WebSocket` (host application).
///
/// Implementations are responsible for transmitting the Scene's trace context
/// and for validating arguments; the Scene performs no validation.
#[async_trait]
pub trait ServiceProtocol: Send + Sync {
    /// Invoke `method` of the service exposed by `project`.
    async fn call(
        &self,
        scene: &Scene,
        project: &str,
        method: &str,
        args: Vec<Value>,
    ) -> anyhow::Result<Value>;
}

/// Listener told which named resources a flow read.
///
/// Registered into a Scene's subscriber set. Implementations accumulate a
/// dependency set and re-run their computation when one of those resources
/// changes; how that happens belongs to the reactive framework.
pub trait Subscriber: Send + Sync {
    /// Called once per broadcast with the resource that was read.
    fn subscribe(&self, resource: &str);
}

//! Operation: one logical unit of distributed work (a trace span).
//!
//! An [`Operation`] is created once per top-level unit of work with
//! [`Operation::new`] and shared (`Arc<Operation>`) by every Scene that takes
//! part in it. Sub-operations spawned within the same trace are created with
//! [`Operation::child`].
//!
//! Only the trace identifiers, the operation name, and the baggage cross a
//! process boundary (see [`TraceContext`]). Props and hooks are process-local.

use std::any::Any;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::context::TraceContext;
use crate::ids::new_id;
use crate::types::{Baggage, BaggageValue};

/// Hook invoked with every failure surfaced through a Scene bound to the operation.
pub type ErrorHook = Arc<dyn Fn(&(dyn Error + 'static)) + Send + Sync>;

/// Hook invoked with the task name whenever an asynchronous task is started.
pub type TaskStartedHook = Arc<dyn Fn(&str) + Send + Sync>;

type PropValue = Arc<dyn Any + Send + Sync>;

/// One span of a distributed trace.
///
/// Identifiers are fixed at construction. Baggage and hooks are set with the
/// consuming `with_*` builders before the operation is shared; props remain
/// mutable through a shared reference.
pub struct Operation {
    trace_id: String,
    span_id: String,
    parent_span_id: Option<String>,
    trace_op: String,
    baggage: Baggage,
    props: RwLock<HashMap<String, PropValue>>,
    on_error: Option<ErrorHook>,
    on_async_task_started: Option<TaskStartedHook>,
}

impl Operation {
    /// Starts a new trace rooted at an operation named `name`.
    ///
    /// Allocates fresh trace and span identifiers; baggage and props are empty
    /// and there is no parent.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            trace_id: new_id(),
            span_id: new_id(),
            parent_span_id: None,
            trace_op: name.into(),
            baggage: Baggage::new(),
            props: RwLock::new(HashMap::new()),
            on_error: None,
            on_async_task_started: None,
        }
    }

    /// Creates a sub-operation within the same trace.
    ///
    /// The child keeps the trace id, gets a new span id, and records this
    /// operation's span id as its parent. Baggage is copied and hooks are
    /// inherited; props start empty.
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: new_id(),
            parent_span_id: Some(self.span_id.clone()),
            trace_op: name.into(),
            baggage: self.baggage.clone(),
            props: RwLock::new(HashMap::new()),
            on_error: self.on_error.clone(),
            on_async_task_started: self.on_async_task_started.clone(),
        }
    }

    /// Reconstructs an operation received from another process.
    ///
    /// Identifiers, name, and baggage are taken from `ctx` unchanged. Props
    /// are empty and no hooks are installed.
    #[must_use]
    pub fn from_trace_context(ctx: TraceContext) -> Self {
        Self {
            trace_id: ctx.trace_id,
            span_id: ctx.span_id,
            parent_span_id: ctx.parent_span_id,
            trace_op: ctx.trace_op,
            baggage: ctx.baggage,
            props: RwLock::new(HashMap::new()),
            on_error: None,
            on_async_task_started: None,
        }
    }

    /// Projects the transmissible part of this operation.
    #[must_use]
    pub fn trace_context(&self) -> TraceContext {
        TraceContext {
            trace_id: self.trace_id.clone(),
            span_id: self.span_id.clone(),
            parent_span_id: self.parent_span_id.clone(),
            trace_op: self.trace_op.clone(),
            baggage: self.baggage.clone(),
        }
    }

    /// Adds a baggage entry.
    #[must_use]
    pub fn with_baggage(mut self, key: impl Into<String>, value: impl Into<BaggageValue>) -> Self {
        self.baggage.insert(key.into(), value.into());
        self
    }

    /// Installs the error observation hook.
    #[must_use]
    pub fn with_on_error(mut self, hook: ErrorHook) -> Self {
        self.on_error = Some(hook);
        self
    }

    /// Installs the task-started hook.
    #[must_use]
    pub fn with_on_async_task_started(mut self, hook: TaskStartedHook) -> Self {
        self.on_async_task_started = Some(hook);
        self
    }

    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    #[must_use]
    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    #[must_use]
    pub fn parent_span_id(&self) -> Option<&str> {
        self.parent_span_id.as_deref()
    }

    #[must_use]
    pub fn trace_op(&self) -> &str {
        &self.trace_op
    }

    #[must_use]
    pub fn baggage(&self) -> &Baggage {
        &self.baggage
    }

    /// Returns `true` if this operation is the root of its trace.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Stores a process-local prop, replacing any previous value under `key`.
    pub fn set_prop<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.props.write().insert(key.into(), Arc::new(value));
    }

    /// Reads a process-local prop of type `T`.
    ///
    /// Returns `None` if the key is absent or holds a value of another type.
    #[must_use]
    pub fn prop<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let value = self.props.read().get(key).cloned()?;
        value.downcast::<T>().ok()
    }

    /// Removes a process-local prop. Returns `true` if it was present.
    pub fn remove_prop(&self, key: &str) -> bool {
        self.props.write().remove(key).is_some()
    }

    /// Passes `err` to the error hook, if one is installed.
    ///
    /// Observation only: the caller still propagates `err`.
    pub fn report_error(&self, err: &(dyn Error + 'static)) {
        if let Some(hook) = &self.on_error {
            hook(err);
        }
    }

    /// Passes `task_name` to the task-started hook, if one is installed.
    pub fn report_task_started(&self, task_name: &str) {
        if let Some(hook) = &self.on_async_task_started {
            hook(task_name);
        }
    }

    /// Returns a `tracing` span tagged with this operation's identity.
    #[must_use]
    pub fn tracing_span(&self) -> tracing::Span {
        tracing::info_span!(
            "operation",
            trace_id = %self.trace_id,
            span_id = %self.span_id,
            parent_span_id = self.parent_span_id.as_deref(),
            trace_op = %self.trace_op,
        )
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("trace_id", &self.trace_id)
            .field("span_id", &self.span_id)
            .field("parent_span_id", &self.parent_span_id)
            .field("trace_op", &self.trace_op)
            .field("baggage", &self.baggage)
            .field("props", &self.props.read().keys().collect::<Vec<_>>())
            .field("on_error", &self.on_error.is_some())
            .field("on_async_task_started", &self.on_async_task_started.is_some())
            .finish()
    }
}

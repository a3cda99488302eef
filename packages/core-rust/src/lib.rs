//! Scene core: operation identity, trace context envelope, and record and value types.

pub mod context;
pub mod ids;
pub mod operation;
pub mod types;

pub use context::{ContextError, TraceContext};
pub use operation::{ErrorHook, Operation, TaskStartedHook};
pub use types::{fields, Baggage, BaggageValue, Fields, Record, RecordClass, Value};

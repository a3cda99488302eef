//! Trace context envelope carried across process and RPC boundaries.
//!
//! [`TraceContext`] is the serializable projection of an
//! [`Operation`](crate::Operation): trace and span identifiers, the operation
//! name, and the baggage. Process-local props and hooks have no field here, so
//! they can never leak onto the wire.
//!
//! # Wire format
//!
//! `MsgPack` (named fields, via `rmp-serde`) for binary transports and JSON
//! for text transports. Field names are camelCase:
//!
//! ```json
//! {"traceId":"…","spanId":"…","parentSpanId":null,"traceOp":"checkout","baggage":{}}
//! ```

use serde::{Deserialize, Serialize};

use crate::types::Baggage;

/// Errors from encoding or decoding a [`TraceContext`].
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to encode trace context: {0}")]
    Encode(String),
    #[error("failed to decode trace context: {0}")]
    Decode(String),
    #[error("trace context field `{field}` is empty")]
    EmptyField { field: &'static str },
}

/// Transmissible identity of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceContext {
    /// Identifier shared by every operation of the trace.
    pub trace_id: String,
    /// Identifier of the sending operation.
    pub span_id: String,
    /// Span that caused the sending operation, absent at the trace root.
    #[serde(default)]
    pub parent_span_id: Option<String>,
    /// Human-readable operation name.
    pub trace_op: String,
    /// Propagated metadata.
    #[serde(default)]
    pub baggage: Baggage,
}

impl TraceContext {
    /// Encodes to `MsgPack` with named fields.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Encode`] if serialization fails.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, ContextError> {
        rmp_serde::to_vec_named(self).map_err(|e| ContextError::Encode(e.to_string()))
    }

    /// Decodes from `MsgPack` and validates the identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Decode`] for malformed input and
    /// [`ContextError::EmptyField`] if an identifier is empty.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, ContextError> {
        let ctx: Self =
            rmp_serde::from_slice(bytes).map_err(|e| ContextError::Decode(e.to_string()))?;
        ctx.validate()?;
        Ok(ctx)
    }

    /// Encodes to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Encode`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ContextError> {
        serde_json::to_string(self).map_err(|e| ContextError::Encode(e.to_string()))
    }

    /// Decodes from a JSON string and validates the identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Decode`] for malformed input and
    /// [`ContextError::EmptyField`] if an identifier is empty.
    pub fn from_json(json: &str) -> Result<Self, ContextError> {
        let ctx: Self =
            serde_json::from_str(json).map_err(|e| ContextError::Decode(e.to_string()))?;
        ctx.validate()?;
        Ok(ctx)
    }

    fn validate(&self) -> Result<(), ContextError> {
        if self.trace_id.is_empty() {
            return Err(ContextError::EmptyField { field: "traceId" });
        }
        if self.span_id.is_empty() {
            return Err(ContextError::EmptyField { field: "spanId" });
        }
        Ok(())
    }
}

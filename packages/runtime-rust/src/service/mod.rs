//! In-process implementation of the remote-call port.
//!
//! A call flows through three steps:
//!
//! 1. **Encoding** (`local`): the caller's trace context and arguments are
//!    serialized to `MsgPack` and decoded again on the receiving side
//! 2. **Receiving scene** (`local`): the operation is rebuilt from the trace
//!    context and bound to a fresh Scene for the target project
//! 3. **Routing** (`router`): dispatch to the handler registered for
//!    `(project, method)`, bounded by the configured timeout

pub mod config;
pub mod local;
pub mod router;

pub use config::LocalServiceConfig;
pub use local::{LocalServiceProtocol, RpcError};
pub use router::{ServiceRequest, ServiceRouter};

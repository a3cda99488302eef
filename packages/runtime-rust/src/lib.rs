//! Scene runtime: per-flow execution context over pluggable storage and remote-call ports.

pub mod error;
pub mod scene;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod traits;

pub use error::SceneError;
pub use scene::{
    FnView, Query, RecordingSubscriber, Scene, SceneConfig, ServiceClient, SubscriberSet, View,
};
pub use service::{LocalServiceConfig, LocalServiceProtocol, RpcError, ServiceRequest, ServiceRouter};
pub use storage::MemoryStorage;
pub use traits::{ServiceProtocol, SqlHints, StoragePort, Subscriber};

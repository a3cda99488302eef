//! Storage port implementations shipped with the runtime.
//!
//! Host applications provide their own [`StoragePort`](crate::traits::StoragePort)
//! for real databases; [`MemoryStorage`] covers tests, demos, and in-process caches.

pub mod memory;

pub use memory::{MemoryStorage, StorageError};

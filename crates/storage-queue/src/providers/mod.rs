//! Queue provider implementations.
//!
//! This module contains concrete implementations of the `QueueProvider`
//! trait: an in-memory reference service and the HTTP storage-queue
//! transport.

pub mod memory;
pub mod storage;

pub use memory::InMemoryProvider;
pub use storage::{StorageError, StorageQueueProvider};

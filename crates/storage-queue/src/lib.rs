//! # Storage Queue
//!
//! Client for durable storage queues with lease semantics.
//!
//! This library provides:
//! - Queue lifecycle: create, existence check, delete, properties
//! - Message lifecycle: send, peek, receive under a visibility lease, lease
//!   update and receipt-guarded delete
//! - Async and blocking calling conventions sharing one implementation
//! - An in-memory reference service and an HTTP storage-queue transport
//! - Retry with exponential backoff for operations that are safe to repeat
//!
//! ## Module Organization
//!
//! - [error] - Error taxonomy and operation context
//! - [message] - Identifiers, message records and send options
//! - [handle] - Queue handles and endpoint capabilities
//! - [provider] - Provider types and configuration
//! - [client] - Async client, provider trait and factory
//! - [blocking] - Blocking client
//! - [providers] - In-memory and HTTP providers
//!
//! ## Example
//!
//! ```rust
//! use storage_queue::{Endpoint, QueueClientFactory, QueueHandle};
//! use chrono::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = QueueClientFactory::create_test_client();
//! let queue = QueueHandle::parse("orders", Endpoint::new("memory://local")?)?;
//!
//! client.create_if_not_exists(&queue).await?;
//! client.send(&queue, "Hello, World").await?;
//!
//! if let Some(message) = client.receive_one(&queue, Duration::seconds(30)).await? {
//!     client
//!         .delete_message(&queue, &message.message_id, &message.pop_receipt)
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod client;
pub mod error;
pub mod handle;
pub mod message;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod time;

pub use blocking::BlockingQueueClient;
pub use client::{CreateOutcome, DeleteOutcome, QueueClient, QueueClientFactory, QueueProvider};
pub use error::{
    ConfigurationError, ErrorKind, Operation, OperationError, QueueError, SerializationError,
    ValidationError,
};
pub use handle::{Endpoint, QueueHandle};
pub use message::{
    MessageId, MessageRecord, PeekedMessage, PopReceipt, QueueName, QueueProperties,
    SendOptions, SendReceipt, TimeToLive, Timestamp, UpdateReceipt,
};
pub use provider::{
    InMemoryConfig, MessageEncoding, ProviderConfig, ProviderType, QueueConfig, RetryConfig,
    StorageQueueConfig,
};
pub use providers::{InMemoryProvider, StorageError, StorageQueueProvider};
pub use retry::RetryPolicy;
pub use time::{ManualTimeProvider, SystemTimeProvider, TimeProvider};

//! Synchronous calling convention over [`QueueClient`].
//!
//! Every method drives the corresponding async operation to completion on a
//! runtime owned by the client, so validation, errors and log events are the
//! same for both conventions.

use crate::client::{CreateOutcome, DeleteOutcome, QueueClient, QueueClientFactory};
use crate::error::{ConfigurationError, OperationError, QueueError};
use crate::handle::QueueHandle;
use crate::message::{
    MessageId, MessageRecord, PeekedMessage, PopReceipt, QueueProperties, SendOptions,
    SendReceipt, UpdateReceipt,
};
use crate::provider::QueueConfig;
use bytes::Bytes;
use chrono::Duration;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

#[cfg(test)]
#[path = "blocking_tests.rs"]
mod tests;

/// Blocking queue client.
///
/// # Panics
///
/// Methods panic when called from inside an async runtime, like any other
/// `block_on`. Use [`QueueClient`] there.
#[derive(Clone)]
pub struct BlockingQueueClient {
    inner: QueueClient,
    runtime: Arc<Runtime>,
}

impl std::fmt::Debug for BlockingQueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingQueueClient")
            .field("inner", &self.inner)
            .finish()
    }
}

impl BlockingQueueClient {
    /// Wrap an async client
    pub fn new(inner: QueueClient) -> Result<Self, QueueError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ConfigurationError::Invalid {
                message: format!("Failed to create blocking runtime: {}", e),
            })?;

        Ok(Self {
            inner,
            runtime: Arc::new(runtime),
        })
    }

    /// Build a blocking client from configuration
    pub fn from_config(config: QueueConfig) -> Result<Self, QueueError> {
        Self::new(QueueClientFactory::create_client(config)?)
    }

    /// Copy of this client whose operations fail with `Timeout` once
    /// `deadline` has elapsed
    pub fn with_deadline(&self, deadline: std::time::Duration) -> Self {
        Self {
            inner: self.inner.with_deadline(deadline),
            runtime: Arc::clone(&self.runtime),
        }
    }

    /// Underlying async client
    pub fn as_async(&self) -> &QueueClient {
        &self.inner
    }

    pub fn create_if_not_exists(
        &self,
        queue: &QueueHandle,
    ) -> Result<CreateOutcome, OperationError> {
        self.runtime.block_on(self.inner.create_if_not_exists(queue))
    }

    pub fn exists(&self, queue: &QueueHandle) -> Result<bool, OperationError> {
        self.runtime.block_on(self.inner.exists(queue))
    }

    pub fn delete_queue(&self, queue: &QueueHandle) -> Result<DeleteOutcome, OperationError> {
        self.runtime.block_on(self.inner.delete_queue(queue))
    }

    pub fn get_properties(&self, queue: &QueueHandle) -> Result<QueueProperties, OperationError> {
        self.runtime.block_on(self.inner.get_properties(queue))
    }

    pub fn send(
        &self,
        queue: &QueueHandle,
        body: impl Into<Bytes>,
    ) -> Result<SendReceipt, OperationError> {
        self.runtime.block_on(self.inner.send(queue, body))
    }

    pub fn send_with_options(
        &self,
        queue: &QueueHandle,
        body: impl Into<Bytes>,
        options: SendOptions,
    ) -> Result<SendReceipt, OperationError> {
        self.runtime
            .block_on(self.inner.send_with_options(queue, body, options))
    }

    pub fn peek(
        &self,
        queue: &QueueHandle,
        max_count: u32,
    ) -> Result<Vec<PeekedMessage>, OperationError> {
        self.runtime.block_on(self.inner.peek(queue, max_count))
    }

    pub fn receive(
        &self,
        queue: &QueueHandle,
        max_count: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<MessageRecord>, OperationError> {
        self.runtime
            .block_on(self.inner.receive(queue, max_count, visibility_timeout))
    }

    pub fn receive_one(
        &self,
        queue: &QueueHandle,
        visibility_timeout: Duration,
    ) -> Result<Option<MessageRecord>, OperationError> {
        self.runtime
            .block_on(self.inner.receive_one(queue, visibility_timeout))
    }

    pub fn update_message(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
        new_body: Option<Bytes>,
        visibility_timeout: Duration,
    ) -> Result<UpdateReceipt, OperationError> {
        self.runtime.block_on(self.inner.update_message(
            queue,
            message_id,
            pop_receipt,
            new_body,
            visibility_timeout,
        ))
    }

    pub fn delete_message(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<DeleteOutcome, OperationError> {
        self.runtime
            .block_on(self.inner.delete_message(queue, message_id, pop_receipt))
    }
}

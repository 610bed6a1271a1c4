//! Queue client, provider trait and client factory.

use crate::error::{ConfigurationError, Operation, OperationError, QueueError, ValidationError};
use crate::handle::QueueHandle;
use crate::message::{
    MessageId, MessageRecord, PeekedMessage, PopReceipt, QueueProperties, SendOptions,
    SendReceipt, UpdateReceipt, MAX_TIME_TO_LIVE_SECONDS, MAX_VISIBILITY_TIMEOUT_SECONDS,
};
use crate::provider::{ProviderConfig, ProviderType, QueueConfig, MAX_BATCH_SIZE};
use crate::providers::{InMemoryProvider, StorageError, StorageQueueProvider};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Result of `create_if_not_exists`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Result of a delete; `AlreadyAbsent` means the desired end state already
/// held when the request arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

/// Interface implemented by specific queue transports.
///
/// The service behind a provider is authoritative for lease state. Providers
/// perform exactly one round-trip per call and keep no copy of message
/// bodies or receipts.
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Create the queue; an existing queue is not an error
    async fn create_queue(&self, queue: &QueueHandle) -> Result<CreateOutcome, QueueError>;

    /// Check whether the queue exists right now
    async fn queue_exists(&self, queue: &QueueHandle) -> Result<bool, QueueError>;

    /// Delete the queue and every message in it
    async fn delete_queue(&self, queue: &QueueHandle) -> Result<(), QueueError>;

    /// Fetch queue properties
    async fn get_properties(&self, queue: &QueueHandle) -> Result<QueueProperties, QueueError>;

    /// Enqueue one message
    async fn send_message(
        &self,
        queue: &QueueHandle,
        body: &Bytes,
        options: &SendOptions,
    ) -> Result<SendReceipt, QueueError>;

    /// Observe visible messages without leasing them
    async fn peek_messages(
        &self,
        queue: &QueueHandle,
        max_messages: u32,
    ) -> Result<Vec<PeekedMessage>, QueueError>;

    /// Lease up to `max_messages` visible messages
    async fn receive_messages(
        &self,
        queue: &QueueHandle,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<MessageRecord>, QueueError>;

    /// Replace the lease (and optionally the body) of a leased message
    async fn update_message(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
        body: Option<&Bytes>,
        visibility_timeout: Duration,
    ) -> Result<UpdateReceipt, QueueError>;

    /// Remove a leased message
    async fn delete_message(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<(), QueueError>;

    /// Get provider type
    fn provider_type(&self) -> ProviderType;

    /// Get maximum batch size for peek/receive
    fn max_batch_size(&self) -> u32;
}

/// Factory for creating queue clients with appropriate providers
pub struct QueueClientFactory;

impl QueueClientFactory {
    /// Create queue client from configuration
    pub fn create_client(config: QueueConfig) -> Result<QueueClient, QueueError> {
        config.validate()?;

        let provider: Arc<dyn QueueProvider> = match &config.provider {
            ProviderConfig::InMemory(in_memory_config) => {
                Arc::new(InMemoryProvider::new(in_memory_config.clone()))
            }
            ProviderConfig::StorageQueue(storage_config) => {
                let provider = StorageQueueProvider::new(storage_config.clone())
                    .map_err(StorageError::to_queue_error)?;
                Arc::new(provider)
            }
        };

        Ok(QueueClient::new(provider, config))
    }

    /// Create test client with in-memory provider
    pub fn create_test_client() -> QueueClient {
        QueueClient::new(
            Arc::new(InMemoryProvider::default()),
            QueueConfig::default(),
        )
    }
}

/// Asynchronous queue client.
///
/// Holds no per-message state: all lease state lives in the service, so a
/// client (and its clones) can be shared freely across tasks. Every operation
/// validates its arguments, applies the deadline, and reports its outcome as
/// a `tracing` event.
#[derive(Clone)]
pub struct QueueClient {
    provider: Arc<dyn QueueProvider>,
    max_message_size: usize,
    max_batch_size: u32,
    retry: RetryPolicy,
    deadline: Option<std::time::Duration>,
}

impl std::fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient")
            .field("provider", &self.provider.provider_type())
            .field("max_message_size", &self.max_message_size)
            .field("max_batch_size", &self.max_batch_size)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl QueueClient {
    /// Create new client over `provider`
    pub fn new(provider: Arc<dyn QueueProvider>, config: QueueConfig) -> Self {
        let max_batch_size = config
            .max_batch_size
            .clamp(1, MAX_BATCH_SIZE)
            .min(provider.max_batch_size());

        Self {
            provider,
            max_message_size: config.max_message_size,
            max_batch_size,
            retry: RetryPolicy::from(&config.retry),
            deadline: config
                .default_timeout_seconds
                .map(std::time::Duration::from_secs),
        }
    }

    /// Copy of this client whose operations fail with `Timeout` once
    /// `deadline` has elapsed
    pub fn with_deadline(&self, deadline: std::time::Duration) -> Self {
        let mut client = self.clone();
        client.deadline = Some(deadline);
        client
    }

    /// Copy of this client without any deadline
    pub fn without_deadline(&self) -> Self {
        let mut client = self.clone();
        client.deadline = None;
        client
    }

    /// Replace the retry policy used for idempotent operations
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Get provider type
    pub fn provider_type(&self) -> ProviderType {
        self.provider.provider_type()
    }

    /// Effective batch cap for peek/receive
    pub fn max_batch_size(&self) -> u32 {
        self.max_batch_size
    }

    // ------------------------------------------------------------------------
    // Queue lifecycle
    // ------------------------------------------------------------------------

    /// Create the queue if it is absent
    pub async fn create_if_not_exists(
        &self,
        queue: &QueueHandle,
    ) -> Result<CreateOutcome, OperationError> {
        let provider = self.provider.as_ref();
        let outcome = self
            .execute(Operation::CreateQueue, queue, None, move || {
                provider.create_queue(queue)
            })
            .await?;

        info!(
            operation = Operation::CreateQueue.as_str(),
            queue = %queue.name(),
            outcome = ?outcome,
            "Queue ready"
        );
        Ok(outcome)
    }

    /// Check whether the queue exists.
    ///
    /// Advisory only: another client may delete or create the queue right
    /// after the answer. Subsequent operations report `NotFound` on their own.
    pub async fn exists(&self, queue: &QueueHandle) -> Result<bool, OperationError> {
        let provider = self.provider.as_ref();
        let exists = self
            .execute(Operation::QueueExists, queue, None, move || {
                provider.queue_exists(queue)
            })
            .await?;

        debug!(
            operation = Operation::QueueExists.as_str(),
            queue = %queue.name(),
            exists,
            "Queue existence checked"
        );
        Ok(exists)
    }

    /// Delete the queue and all its messages
    pub async fn delete_queue(&self, queue: &QueueHandle) -> Result<DeleteOutcome, OperationError> {
        let provider = self.provider.as_ref();
        let result = self
            .execute(Operation::DeleteQueue, queue, None, move || {
                provider.delete_queue(queue)
            })
            .await;

        let outcome = absorb_not_found(result)?;
        info!(
            operation = Operation::DeleteQueue.as_str(),
            queue = %queue.name(),
            outcome = ?outcome,
            "Queue deleted"
        );
        Ok(outcome)
    }

    /// Fetch queue properties; the message count is approximate
    pub async fn get_properties(
        &self,
        queue: &QueueHandle,
    ) -> Result<QueueProperties, OperationError> {
        let provider = self.provider.as_ref();
        let properties = self
            .execute(Operation::GetProperties, queue, None, move || {
                provider.get_properties(queue)
            })
            .await?;

        info!(
            operation = Operation::GetProperties.as_str(),
            queue = %queue.name(),
            approximate_message_count = properties.approximate_message_count,
            "Queue properties retrieved"
        );
        Ok(properties)
    }

    // ------------------------------------------------------------------------
    // Message lifecycle
    // ------------------------------------------------------------------------

    /// Enqueue one message with default options
    pub async fn send(
        &self,
        queue: &QueueHandle,
        body: impl Into<Bytes>,
    ) -> Result<SendReceipt, OperationError> {
        self.send_with_options(queue, body, SendOptions::default())
            .await
    }

    /// Enqueue one message.
    ///
    /// Never retried automatically: after a `Timeout` the message may or may
    /// not have been accepted.
    pub async fn send_with_options(
        &self,
        queue: &QueueHandle,
        body: impl Into<Bytes>,
        options: SendOptions,
    ) -> Result<SendReceipt, OperationError> {
        let body = body.into();
        self.check_body_size(&body)
            .and_then(|_| options.validate().map_err(QueueError::from))
            .map_err(|e| self.fail(Operation::SendMessage, queue, None, e))?;

        let provider = self.provider.as_ref();
        let (body_ref, options_ref) = (&body, &options);
        let receipt = self
            .execute(Operation::SendMessage, queue, None, move || {
                provider.send_message(queue, body_ref, options_ref)
            })
            .await?;

        info!(
            operation = Operation::SendMessage.as_str(),
            queue = %queue.name(),
            message_id = %receipt.message_id,
            size = body.len(),
            "Message sent"
        );
        debug!(message_id = %receipt.message_id, body = %String::from_utf8_lossy(&body), "Sent body");
        Ok(receipt)
    }

    /// Observe up to `max_count` visible messages without leasing them
    pub async fn peek(
        &self,
        queue: &QueueHandle,
        max_count: u32,
    ) -> Result<Vec<PeekedMessage>, OperationError> {
        self.check_batch_size(max_count)
            .map_err(|e| self.fail(Operation::PeekMessages, queue, None, e))?;

        let provider = self.provider.as_ref();
        let messages = self
            .execute(Operation::PeekMessages, queue, None, move || {
                provider.peek_messages(queue, max_count)
            })
            .await?;

        info!(
            operation = Operation::PeekMessages.as_str(),
            queue = %queue.name(),
            count = messages.len(),
            "Messages peeked"
        );
        Ok(messages)
    }

    /// Lease up to `max_count` messages for `visibility_timeout`.
    ///
    /// Delivery is at-least-once and unordered: a message not deleted before
    /// its window lapses becomes visible again.
    pub async fn receive(
        &self,
        queue: &QueueHandle,
        max_count: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<MessageRecord>, OperationError> {
        self.check_batch_size(max_count)
            .and_then(|_| check_visibility_timeout(visibility_timeout, 1))
            .map_err(|e| self.fail(Operation::ReceiveMessages, queue, None, e))?;

        let provider = self.provider.as_ref();
        let messages = self
            .execute(Operation::ReceiveMessages, queue, None, move || {
                provider.receive_messages(queue, max_count, visibility_timeout)
            })
            .await?;

        for message in &messages {
            info!(
                operation = Operation::ReceiveMessages.as_str(),
                queue = %queue.name(),
                message_id = %message.message_id,
                dequeue_count = message.dequeue_count,
                visible_at = %message.visible_at,
                "Message leased"
            );
        }
        if messages.is_empty() {
            debug!(
                operation = Operation::ReceiveMessages.as_str(),
                queue = %queue.name(),
                "No visible messages"
            );
        }
        Ok(messages)
    }

    /// Lease a single message, if one is visible
    pub async fn receive_one(
        &self,
        queue: &QueueHandle,
        visibility_timeout: Duration,
    ) -> Result<Option<MessageRecord>, OperationError> {
        let messages = self.receive(queue, 1, visibility_timeout).await?;
        Ok(messages.into_iter().next())
    }

    /// Replace the lease of a received message, optionally with a new body.
    ///
    /// Consumes `pop_receipt`; use the returned receipt for any further call.
    pub async fn update_message(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
        new_body: Option<Bytes>,
        visibility_timeout: Duration,
    ) -> Result<UpdateReceipt, OperationError> {
        let checked = match &new_body {
            Some(body) => self.check_body_size(body),
            None => Ok(()),
        };
        checked
            .and_then(|_| check_visibility_timeout(visibility_timeout, 0))
            .map_err(|e| self.fail(Operation::UpdateMessage, queue, Some(message_id), e))?;

        let provider = self.provider.as_ref();
        let body_ref = new_body.as_ref();
        let receipt = self
            .execute(Operation::UpdateMessage, queue, Some(message_id), move || {
                provider.update_message(queue, message_id, pop_receipt, body_ref, visibility_timeout)
            })
            .await?;

        info!(
            operation = Operation::UpdateMessage.as_str(),
            queue = %queue.name(),
            message_id = %message_id,
            body_replaced = new_body.is_some(),
            visible_at = %receipt.visible_at,
            "Message lease updated"
        );
        Ok(receipt)
    }

    /// Permanently remove a received message.
    ///
    /// A message that is already gone yields `DeleteOutcome::AlreadyAbsent`;
    /// a stale receipt fails with `PreconditionFailed`.
    pub async fn delete_message(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<DeleteOutcome, OperationError> {
        let provider = self.provider.as_ref();
        let result = self
            .execute(Operation::DeleteMessage, queue, Some(message_id), move || {
                provider.delete_message(queue, message_id, pop_receipt)
            })
            .await;

        let outcome = absorb_not_found(result)?;
        info!(
            operation = Operation::DeleteMessage.as_str(),
            queue = %queue.name(),
            message_id = %message_id,
            outcome = ?outcome,
            "Message deleted"
        );
        Ok(outcome)
    }

    // ------------------------------------------------------------------------
    // Execution helpers
    // ------------------------------------------------------------------------

    /// Run `call` under the deadline, retrying transient failures of
    /// idempotent operations
    async fn execute<T, F, Fut>(
        &self,
        operation: Operation,
        queue: &QueueHandle,
        message_id: Option<&MessageId>,
        call: F,
    ) -> Result<T, OperationError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, QueueError>>,
    {
        let attempts = self.run_with_retry(operation, queue, call);
        let result = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, attempts)
                .await
                .unwrap_or(Err(QueueError::Timeout { duration: deadline })),
            None => attempts.await,
        };

        result.map_err(|e| self.fail(operation, queue, message_id, e))
    }

    async fn run_with_retry<T, F, Fut>(
        &self,
        operation: Operation,
        queue: &QueueHandle,
        call: F,
    ) -> Result<T, QueueError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, QueueError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error)
                    if operation.is_idempotent()
                        && error.is_transient()
                        && self.retry.should_retry(attempt) =>
                {
                    let delay = self.retry.delay_for(&error, attempt);
                    warn!(
                        operation = operation.as_str(),
                        queue = %queue.name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn fail(
        &self,
        operation: Operation,
        queue: &QueueHandle,
        message_id: Option<&MessageId>,
        error: QueueError,
    ) -> OperationError {
        let error = OperationError::new(operation, queue.name().clone(), message_id.cloned(), error);
        if error.is_not_found() {
            debug!(
                operation = operation.as_str(),
                queue = %queue.name(),
                message_id = ?message_id.map(|id| id.as_str()),
                kind = %error.kind(),
                "Queue operation target not found"
            );
        } else {
            warn!(
                operation = operation.as_str(),
                queue = %queue.name(),
                message_id = ?message_id.map(|id| id.as_str()),
                kind = %error.kind(),
                error = %error.source,
                "Queue operation failed"
            );
        }
        error
    }

    fn check_body_size(&self, body: &Bytes) -> Result<(), QueueError> {
        if body.len() > self.max_message_size {
            return Err(QueueError::MessageTooLarge {
                size: body.len(),
                max_size: self.max_message_size,
            });
        }
        Ok(())
    }

    fn check_batch_size(&self, max_count: u32) -> Result<(), QueueError> {
        if max_count == 0 {
            return Err(ValidationError::OutOfRange {
                field: "max_count".to_string(),
                message: "must be at least 1".to_string(),
            }
            .into());
        }
        if max_count > self.max_batch_size {
            return Err(QueueError::BatchTooLarge {
                size: max_count as usize,
                max_size: self.max_batch_size as usize,
            });
        }
        Ok(())
    }
}

fn check_visibility_timeout(timeout: Duration, min_seconds: i64) -> Result<(), QueueError> {
    let seconds = timeout.num_seconds();
    if timeout < Duration::seconds(min_seconds) || seconds > MAX_VISIBILITY_TIMEOUT_SECONDS {
        return Err(ValidationError::OutOfRange {
            field: "visibility_timeout".to_string(),
            message: format!("must be between {} seconds and 7 days", min_seconds),
        }
        .into());
    }
    Ok(())
}

fn absorb_not_found(result: Result<(), OperationError>) -> Result<DeleteOutcome, OperationError> {
    match result {
        Ok(()) => Ok(DeleteOutcome::Deleted),
        Err(error) if error.is_not_found() => Ok(DeleteOutcome::AlreadyAbsent),
        Err(error) => Err(error),
    }
}

impl QueueConfig {
    /// Check configuration values before building a client
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_SIZE {
            return Err(ConfigurationError::Invalid {
                message: format!("max_batch_size must be between 1 and {}", MAX_BATCH_SIZE),
            });
        }
        if self.max_message_size == 0 {
            return Err(ConfigurationError::Invalid {
                message: "max_message_size must be positive".to_string(),
            });
        }
        if self.default_timeout_seconds == Some(0) {
            return Err(ConfigurationError::Invalid {
                message: "default_timeout_seconds must be positive when set".to_string(),
            });
        }
        if let ProviderConfig::InMemory(memory) = &self.provider {
            let in_range = memory.default_message_ttl_seconds.map_or(true, |seconds| {
                i64::try_from(seconds)
                    .is_ok_and(|seconds| (1..=MAX_TIME_TO_LIVE_SECONDS).contains(&seconds))
            });
            if !in_range {
                return Err(ConfigurationError::Invalid {
                    message: format!(
                        "default_message_ttl_seconds must be between 1 and {}",
                        MAX_TIME_TO_LIVE_SECONDS
                    ),
                });
            }
        }
        Ok(())
    }
}

//! In-memory queue service for testing and development.
//!
//! This module provides a complete in-memory implementation of the lease
//! state machine:
//! - Visibility windows driven by an injectable clock
//! - Pop receipts that are replaced by every receive and update
//! - Message time-to-live and approximate queue length
//!
//! It is the reference semantics the HTTP provider is tested against.

use crate::client::{CreateOutcome, QueueProvider};
use crate::error::{ConfigurationError, QueueError, ValidationError};
use crate::handle::QueueHandle;
use crate::message::{
    MessageId, MessageRecord, PeekedMessage, PopReceipt, QueueName, QueueProperties,
    SendOptions, SendReceipt, TimeToLive, Timestamp, UpdateReceipt, MAX_TIME_TO_LIVE_SECONDS,
};
use crate::provider::{InMemoryConfig, ProviderType, MAX_BATCH_SIZE};
use crate::time::{SystemTimeProvider, TimeProvider};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

const PROVIDER_NAME: &str = "in_memory";

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Thread-safe storage for all queues
struct QueueStorage {
    queues: HashMap<QueueName, InMemoryQueue>,
}

impl QueueStorage {
    fn new() -> Self {
        Self {
            queues: HashMap::new(),
        }
    }

    fn queue(&self, queue_name: &QueueName) -> Result<&InMemoryQueue, QueueError> {
        self.queues
            .get(queue_name)
            .ok_or_else(|| queue_not_found(queue_name))
    }

    fn queue_mut(&mut self, queue_name: &QueueName) -> Result<&mut InMemoryQueue, QueueError> {
        self.queues
            .get_mut(queue_name)
            .ok_or_else(|| queue_not_found(queue_name))
    }
}

/// Internal state for a single queue
#[derive(Default)]
struct InMemoryQueue {
    /// Messages in insertion order, visible or not
    messages: VecDeque<StoredMessage>,
    metadata: HashMap<String, String>,
}

impl InMemoryQueue {
    /// Drop messages whose time-to-live has elapsed
    fn purge_expired(&mut self, now: Timestamp) {
        self.messages.retain(|message| !message.is_expired(now));
    }

    fn live_messages(&self, now: Timestamp) -> impl Iterator<Item = &StoredMessage> {
        self.messages
            .iter()
            .filter(move |message| !message.is_expired(now))
    }

    /// Find a live message and check `pop_receipt` against its current lease
    fn leased_message_mut(
        &mut self,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
        now: Timestamp,
    ) -> Result<&mut StoredMessage, QueueError> {
        let message = self
            .messages
            .iter_mut()
            .find(|message| &message.message_id == message_id && !message.is_expired(now))
            .ok_or_else(|| QueueError::MessageNotFound {
                message_id: message_id.to_string(),
            })?;

        if message.pop_receipt.as_ref() != Some(pop_receipt) {
            return Err(QueueError::PopReceiptMismatch {
                message_id: message_id.to_string(),
            });
        }

        Ok(message)
    }
}

/// A message stored in the queue with its lease state
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    /// Receipt of the latest lease; `None` until first received
    pop_receipt: Option<PopReceipt>,
    visible_at: Timestamp,
    dequeue_count: u32,
    inserted_at: Timestamp,
    expires_at: Option<Timestamp>,
}

impl StoredMessage {
    fn is_expired(&self, now: Timestamp) -> bool {
        matches!(self.expires_at, Some(expires_at) if now >= expires_at)
    }

    fn is_visible(&self, now: Timestamp) -> bool {
        now >= self.visible_at
    }

    fn to_peeked(&self) -> PeekedMessage {
        PeekedMessage {
            message_id: self.message_id.clone(),
            body: self.body.clone(),
            dequeue_count: self.dequeue_count,
            inserted_at: self.inserted_at,
            expires_at: self.expires_at,
        }
    }

    /// Start a new lease, invalidating any previous receipt
    fn lease(&mut self, now: Timestamp, visibility_timeout: Duration) -> MessageRecord {
        let pop_receipt = PopReceipt::new();
        self.pop_receipt = Some(pop_receipt.clone());
        self.visible_at = now.plus(visibility_timeout);
        self.dequeue_count += 1;

        MessageRecord {
            message_id: self.message_id.clone(),
            body: self.body.clone(),
            pop_receipt,
            visible_at: self.visible_at,
            dequeue_count: self.dequeue_count,
            inserted_at: self.inserted_at,
            expires_at: self.expires_at,
        }
    }
}

fn queue_not_found(queue_name: &QueueName) -> QueueError {
    QueueError::QueueNotFound {
        queue_name: queue_name.to_string(),
    }
}

// ============================================================================
// InMemoryProvider
// ============================================================================

/// In-memory queue provider implementation.
///
/// Clones share the same storage, so several clients built over clones of
/// one provider see the same queues. The endpoint of a handle is ignored.
#[derive(Clone)]
pub struct InMemoryProvider {
    storage: Arc<RwLock<QueueStorage>>,
    config: InMemoryConfig,
    clock: Arc<dyn TimeProvider>,
}

impl InMemoryProvider {
    /// Create new in-memory provider with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self::with_time_provider(config, Arc::new(SystemTimeProvider))
    }

    /// Create provider whose visibility windows and expiry follow `clock`
    pub fn with_time_provider(config: InMemoryConfig, clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            storage: Arc::new(RwLock::new(QueueStorage::new())),
            config,
            clock,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, QueueStorage>, QueueError> {
        self.storage.read().map_err(|_| lock_poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, QueueStorage>, QueueError> {
        self.storage.write().map_err(|_| lock_poisoned())
    }

    fn expiry_for(
        &self,
        now: Timestamp,
        time_to_live: TimeToLive,
    ) -> Result<Option<Timestamp>, QueueError> {
        let ttl = match time_to_live {
            TimeToLive::ServiceDefault => match self.config.default_message_ttl_seconds {
                Some(seconds) => default_ttl(seconds)?,
                None => return Ok(None),
            },
            TimeToLive::After(ttl) => ttl,
            TimeToLive::Never => return Ok(None),
        };

        now.checked_plus(ttl)
            .map(Some)
            .ok_or_else(|| {
                ValidationError::OutOfRange {
                    field: "time_to_live".to_string(),
                    message: "expiry is past the latest representable time".to_string(),
                }
                .into()
            })
    }
}

impl Default for InMemoryProvider {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

fn default_ttl(seconds: u64) -> Result<Duration, QueueError> {
    i64::try_from(seconds)
        .ok()
        .filter(|seconds| (1..=MAX_TIME_TO_LIVE_SECONDS).contains(seconds))
        .and_then(Duration::try_seconds)
        .ok_or_else(|| {
            ConfigurationError::Invalid {
                message: format!(
                    "default_message_ttl_seconds must be between 1 and {}",
                    MAX_TIME_TO_LIVE_SECONDS
                ),
            }
            .into()
        })
}

fn lock_poisoned() -> QueueError {
    QueueError::ProviderError {
        provider: PROVIDER_NAME.to_string(),
        status: 500,
        code: "StorageLockPoisoned".to_string(),
        message: "a previous operation panicked while holding the queue storage lock"
            .to_string(),
    }
}

#[async_trait]
impl QueueProvider for InMemoryProvider {
    async fn create_queue(&self, queue: &QueueHandle) -> Result<CreateOutcome, QueueError> {
        let mut storage = self.write()?;
        if storage.queues.contains_key(queue.name()) {
            return Ok(CreateOutcome::AlreadyExists);
        }

        storage
            .queues
            .insert(queue.name().clone(), InMemoryQueue::default());
        Ok(CreateOutcome::Created)
    }

    async fn queue_exists(&self, queue: &QueueHandle) -> Result<bool, QueueError> {
        Ok(self.read()?.queues.contains_key(queue.name()))
    }

    async fn delete_queue(&self, queue: &QueueHandle) -> Result<(), QueueError> {
        self.write()?
            .queues
            .remove(queue.name())
            .map(|_| ())
            .ok_or_else(|| queue_not_found(queue.name()))
    }

    async fn get_properties(&self, queue: &QueueHandle) -> Result<QueueProperties, QueueError> {
        let now = self.clock.now();
        let storage = self.read()?;
        let stored = storage.queue(queue.name())?;

        Ok(QueueProperties {
            approximate_message_count: stored.live_messages(now).count() as u64,
            metadata: stored.metadata.clone(),
        })
    }

    async fn send_message(
        &self,
        queue: &QueueHandle,
        body: &Bytes,
        options: &SendOptions,
    ) -> Result<SendReceipt, QueueError> {
        let now = self.clock.now();
        let expires_at = self.expiry_for(now, options.time_to_live)?;

        let mut storage = self.write()?;
        let stored = storage.queue_mut(queue.name())?;
        stored.purge_expired(now);

        if stored.messages.len() >= self.config.max_queue_size {
            return Err(QueueError::ProviderError {
                provider: PROVIDER_NAME.to_string(),
                status: 503,
                code: "QueueFull".to_string(),
                message: format!(
                    "queue holds the maximum of {} messages",
                    self.config.max_queue_size
                ),
            });
        }

        let message = StoredMessage {
            message_id: MessageId::new(),
            body: body.clone(),
            pop_receipt: None,
            visible_at: now.plus(options.visibility_delay),
            dequeue_count: 0,
            inserted_at: now,
            expires_at,
        };
        let receipt = SendReceipt {
            message_id: message.message_id.clone(),
            inserted_at: message.inserted_at,
            expires_at: message.expires_at,
            visible_at: message.visible_at,
        };

        stored.messages.push_back(message);
        Ok(receipt)
    }

    async fn peek_messages(
        &self,
        queue: &QueueHandle,
        max_messages: u32,
    ) -> Result<Vec<PeekedMessage>, QueueError> {
        let now = self.clock.now();
        let storage = self.read()?;
        let stored = storage.queue(queue.name())?;

        Ok(stored
            .live_messages(now)
            .filter(|message| message.is_visible(now))
            .take(max_messages as usize)
            .map(StoredMessage::to_peeked)
            .collect())
    }

    async fn receive_messages(
        &self,
        queue: &QueueHandle,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<MessageRecord>, QueueError> {
        let now = self.clock.now();
        let mut storage = self.write()?;
        let stored = storage.queue_mut(queue.name())?;
        stored.purge_expired(now);

        Ok(stored
            .messages
            .iter_mut()
            .filter(|message| message.is_visible(now))
            .take(max_messages as usize)
            .map(|message| message.lease(now, visibility_timeout))
            .collect())
    }

    async fn update_message(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
        body: Option<&Bytes>,
        visibility_timeout: Duration,
    ) -> Result<UpdateReceipt, QueueError> {
        let now = self.clock.now();
        let mut storage = self.write()?;
        let message = storage
            .queue_mut(queue.name())?
            .leased_message_mut(message_id, pop_receipt, now)?;

        let new_receipt = PopReceipt::new();
        message.pop_receipt = Some(new_receipt.clone());
        message.visible_at = now.plus(visibility_timeout);
        if let Some(body) = body {
            message.body = body.clone();
        }

        Ok(UpdateReceipt {
            pop_receipt: new_receipt,
            visible_at: message.visible_at,
        })
    }

    async fn delete_message(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<(), QueueError> {
        let now = self.clock.now();
        let mut storage = self.write()?;
        let stored = storage.queue_mut(queue.name())?;
        stored.leased_message_mut(message_id, pop_receipt, now)?;
        stored
            .messages
            .retain(|message| &message.message_id != message_id);
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }

    fn max_batch_size(&self) -> u32 {
        MAX_BATCH_SIZE
    }
}

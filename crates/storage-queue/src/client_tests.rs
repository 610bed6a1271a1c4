//! Tests for the queue client.

use super::*;
use crate::error::ErrorKind;
use crate::handle::Endpoint;
use crate::message::Timestamp;
use std::sync::atomic::{AtomicU32, Ordering};

fn queue(name: &str) -> QueueHandle {
    QueueHandle::parse(name, Endpoint::new("memory://local").unwrap()).unwrap()
}

async fn client_with_queue(name: &str) -> (QueueClient, QueueHandle) {
    let client = QueueClientFactory::create_test_client();
    let handle = queue(name);
    client
        .create_if_not_exists(&handle)
        .await
        .expect("Setup: create should succeed");
    (client, handle)
}

// ============================================================================
// Scripted provider for retry and deadline behaviour
// ============================================================================

/// Provider that fails a fixed number of calls, optionally after a delay
struct ScriptedProvider {
    failures_remaining: AtomicU32,
    calls: AtomicU32,
    delay: Option<std::time::Duration>,
}

impl ScriptedProvider {
    fn failing(failures: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
            delay: None,
        }
    }

    fn slow(delay: std::time::Duration) -> Self {
        Self {
            failures_remaining: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            delay: Some(delay),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn attempt(&self) -> Result<(), QueueError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(QueueError::ConnectionFailed {
                message: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl QueueProvider for ScriptedProvider {
    async fn create_queue(&self, _queue: &QueueHandle) -> Result<CreateOutcome, QueueError> {
        self.attempt().await.map(|_| CreateOutcome::Created)
    }

    async fn queue_exists(&self, _queue: &QueueHandle) -> Result<bool, QueueError> {
        self.attempt().await.map(|_| true)
    }

    async fn delete_queue(&self, _queue: &QueueHandle) -> Result<(), QueueError> {
        self.attempt().await
    }

    async fn get_properties(&self, _queue: &QueueHandle) -> Result<QueueProperties, QueueError> {
        self.attempt().await.map(|_| QueueProperties::default())
    }

    async fn send_message(
        &self,
        _queue: &QueueHandle,
        _body: &Bytes,
        _options: &SendOptions,
    ) -> Result<SendReceipt, QueueError> {
        self.attempt().await?;
        let now = Timestamp::now();
        Ok(SendReceipt {
            message_id: MessageId::new(),
            inserted_at: now,
            expires_at: None,
            visible_at: now,
        })
    }

    async fn peek_messages(
        &self,
        _queue: &QueueHandle,
        _max_messages: u32,
    ) -> Result<Vec<PeekedMessage>, QueueError> {
        self.attempt().await.map(|_| Vec::new())
    }

    async fn receive_messages(
        &self,
        _queue: &QueueHandle,
        _max_messages: u32,
        _visibility_timeout: Duration,
    ) -> Result<Vec<MessageRecord>, QueueError> {
        self.attempt().await.map(|_| Vec::new())
    }

    async fn update_message(
        &self,
        _queue: &QueueHandle,
        _message_id: &MessageId,
        _pop_receipt: &PopReceipt,
        _body: Option<&Bytes>,
        _visibility_timeout: Duration,
    ) -> Result<UpdateReceipt, QueueError> {
        self.attempt().await?;
        Ok(UpdateReceipt {
            pop_receipt: PopReceipt::new(),
            visible_at: Timestamp::now(),
        })
    }

    async fn delete_message(
        &self,
        _queue: &QueueHandle,
        _message_id: &MessageId,
        _pop_receipt: &PopReceipt,
    ) -> Result<(), QueueError> {
        self.attempt().await
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::InMemory
    }

    fn max_batch_size(&self) -> u32 {
        MAX_BATCH_SIZE
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(
        3,
        std::time::Duration::from_millis(10),
        std::time::Duration::from_millis(100),
        2.0,
    )
    .without_jitter()
}

// ============================================================================
// Factory
// ============================================================================

mod factory {
    use super::*;
    use crate::provider::{InMemoryConfig, StorageQueueConfig};

    #[test]
    fn test_create_test_client_uses_in_memory_provider() {
        let client = QueueClientFactory::create_test_client();
        assert_eq!(client.provider_type(), ProviderType::InMemory);
        assert_eq!(client.max_batch_size(), 32);
    }

    #[test]
    fn test_create_client_from_config() {
        let config = QueueConfig {
            provider: ProviderConfig::InMemory(InMemoryConfig::default()),
            max_batch_size: 10,
            ..Default::default()
        };

        let client = QueueClientFactory::create_client(config).unwrap();
        assert_eq!(client.max_batch_size(), 10);
    }

    #[test]
    fn test_create_storage_client() {
        let config = QueueConfig {
            provider: ProviderConfig::StorageQueue(StorageQueueConfig::default()),
            ..Default::default()
        };

        let client = QueueClientFactory::create_client(config).unwrap();
        assert_eq!(client.provider_type(), ProviderType::StorageQueue);
    }

    #[test]
    fn test_create_client_rejects_invalid_config() {
        let config = QueueConfig {
            max_batch_size: 64,
            ..Default::default()
        };

        let result = QueueClientFactory::create_client(config);
        assert!(matches!(result, Err(QueueError::ConfigurationError(_))));
    }

    #[test]
    fn test_create_client_rejects_out_of_range_default_ttl() {
        for ttl in [0, u64::MAX, i64::MAX as u64, i32::MAX as u64 + 1] {
            let config = QueueConfig {
                provider: ProviderConfig::InMemory(InMemoryConfig {
                    default_message_ttl_seconds: Some(ttl),
                    ..Default::default()
                }),
                ..Default::default()
            };

            let result = QueueClientFactory::create_client(config);
            assert!(
                matches!(result, Err(QueueError::ConfigurationError(_))),
                "ttl {} should be rejected",
                ttl
            );
        }

        let config = QueueConfig {
            provider: ProviderConfig::InMemory(InMemoryConfig {
                default_message_ttl_seconds: Some(i32::MAX as u64),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(QueueClientFactory::create_client(config).is_ok());
    }
}

// ============================================================================
// Queue lifecycle
// ============================================================================

mod queue_lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_create_if_not_exists_reports_outcome() {
        let client = QueueClientFactory::create_test_client();
        let handle = queue("orders");

        assert_eq!(
            client.create_if_not_exists(&handle).await.unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            client.create_if_not_exists(&handle).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert!(client.exists(&handle).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_queue_absorbs_not_found() {
        let (client, handle) = client_with_queue("orders").await;

        assert_eq!(
            client.delete_queue(&handle).await.unwrap(),
            DeleteOutcome::Deleted
        );
        assert!(!client.exists(&handle).await.unwrap());
        assert_eq!(
            client.delete_queue(&handle).await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
    }

    #[tokio::test]
    async fn test_get_properties_counts_messages() {
        let (client, handle) = client_with_queue("orders").await;
        client.send(&handle, "one").await.unwrap();
        client.send(&handle, "two").await.unwrap();

        let properties = client.get_properties(&handle).await.unwrap();
        assert_eq!(properties.approximate_message_count, 2);
    }

    #[tokio::test]
    async fn test_get_properties_of_missing_queue_is_not_found() {
        let client = QueueClientFactory::create_test_client();

        let error = client.get_properties(&queue("missing")).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.operation, Operation::GetProperties);
    }
}

// ============================================================================
// Message lifecycle
// ============================================================================

mod message_lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_send_to_missing_queue_does_not_create_it() {
        let client = QueueClientFactory::create_test_client();
        let handle = queue("missing");

        let error = client.send(&handle, "hello").await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert_eq!(error.queue.as_str(), "missing");
        assert!(!client.exists(&handle).await.unwrap());
    }

    #[tokio::test]
    async fn test_send_receive_delete_round_trip() {
        let (client, handle) = client_with_queue("orders").await;

        let receipt = client.send(&handle, "Hello, World").await.unwrap();
        let message = client
            .receive_one(&handle, Duration::seconds(30))
            .await
            .unwrap()
            .expect("message should be visible");

        assert_eq!(message.message_id, receipt.message_id);
        assert_eq!(message.body_text().unwrap(), "Hello, World");
        assert_eq!(message.dequeue_count, 1);

        let outcome = client
            .delete_message(&handle, &message.message_id, &message.pop_receipt)
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);

        assert!(client
            .receive_one(&handle, Duration::seconds(30))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_second_delete_is_already_absent() {
        let (client, handle) = client_with_queue("orders").await;
        client.send(&handle, "once").await.unwrap();
        let message = client
            .receive_one(&handle, Duration::seconds(30))
            .await
            .unwrap()
            .unwrap();

        client
            .delete_message(&handle, &message.message_id, &message.pop_receipt)
            .await
            .unwrap();
        let second = client
            .delete_message(&handle, &message.message_id, &message.pop_receipt)
            .await
            .unwrap();

        assert_eq!(second, DeleteOutcome::AlreadyAbsent);
    }

    #[tokio::test]
    async fn test_update_consumes_receipt() {
        let (client, handle) = client_with_queue("orders").await;
        client.send(&handle, "draft").await.unwrap();
        let message = client
            .receive_one(&handle, Duration::seconds(30))
            .await
            .unwrap()
            .unwrap();

        let updated = client
            .update_message(
                &handle,
                &message.message_id,
                &message.pop_receipt,
                Some(Bytes::from("final")),
                Duration::zero(),
            )
            .await
            .unwrap();
        assert_ne!(updated.pop_receipt, message.pop_receipt);

        let stale = client
            .delete_message(&handle, &message.message_id, &message.pop_receipt)
            .await
            .unwrap_err();
        assert_eq!(stale.kind(), ErrorKind::PreconditionFailed);
        assert_eq!(stale.message_id.as_ref(), Some(&message.message_id));

        let peeked = client.peek(&handle, 1).await.unwrap();
        assert_eq!(peeked[0].body_text().unwrap(), "final");
    }
}

// ============================================================================
// Argument validation
// ============================================================================

mod validation {
    use super::*;

    #[tokio::test]
    async fn test_batch_size_limits() {
        let (client, handle) = client_with_queue("orders").await;

        let zero = client.peek(&handle, 0).await.unwrap_err();
        assert_eq!(zero.kind(), ErrorKind::InvalidArgument);

        let too_many = client
            .receive(&handle, 33, Duration::seconds(30))
            .await
            .unwrap_err();
        assert_eq!(too_many.kind(), ErrorKind::InvalidArgument);
        assert!(matches!(
            too_many.error(),
            QueueError::BatchTooLarge {
                size: 33,
                max_size: 32
            }
        ));

        assert!(client.peek(&handle, 32).await.is_ok());
    }

    #[tokio::test]
    async fn test_receive_visibility_timeout_range() {
        let (client, handle) = client_with_queue("orders").await;

        let zero = client
            .receive(&handle, 1, Duration::zero())
            .await
            .unwrap_err();
        assert_eq!(zero.kind(), ErrorKind::InvalidArgument);

        let too_long = client
            .receive(&handle, 1, Duration::days(8))
            .await
            .unwrap_err();
        assert_eq!(too_long.kind(), ErrorKind::InvalidArgument);

        assert!(client.receive(&handle, 1, Duration::days(7)).await.is_ok());
    }

    #[tokio::test]
    async fn test_payload_limit() {
        let (client, handle) = client_with_queue("orders").await;

        let oversized = vec![b'x'; 64 * 1024 + 1];
        let error = client.send(&handle, oversized).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::PayloadTooLarge);

        let exact = vec![b'x'; 64 * 1024];
        assert!(client.send(&handle, exact).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_send_options() {
        let (client, handle) = client_with_queue("orders").await;

        let options = SendOptions::new().with_visibility_delay(Duration::days(8));
        let error = client
            .send_with_options(&handle, "late", options)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        assert_eq!(error.operation, Operation::SendMessage);
    }

    #[tokio::test]
    async fn test_time_to_live_beyond_service_limit_is_rejected() {
        let (client, handle) = client_with_queue("orders").await;

        let options = SendOptions::new().with_time_to_live(Duration::days(100_000_000));
        let error = client
            .send_with_options(&handle, "x", options)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
        let properties = client.get_properties(&handle).await.unwrap();
        assert_eq!(properties.approximate_message_count, 0);
    }
}

// ============================================================================
// Retry and deadline
// ============================================================================

mod retry_and_deadline {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_idempotent_operation_is_retried() {
        let provider = Arc::new(ScriptedProvider::failing(2));
        let client = QueueClient::new(provider.clone(), QueueConfig::default())
            .with_retry_policy(fast_retry());

        let exists = client.exists(&queue("orders")).await.unwrap();

        assert!(exists);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_give_up_after_policy_limit() {
        let provider = Arc::new(ScriptedProvider::failing(10));
        let client = QueueClient::new(provider.clone(), QueueConfig::default())
            .with_retry_policy(fast_retry());

        let error = client.peek(&queue("orders"), 1).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(provider.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_is_never_retried() {
        let provider = Arc::new(ScriptedProvider::failing(1));
        let client = QueueClient::new(provider.clone(), QueueConfig::default())
            .with_retry_policy(fast_retry());

        let error = client.send(&queue("orders"), "once").await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_and_update_are_never_retried() {
        let provider = Arc::new(ScriptedProvider::failing(2));
        let client = QueueClient::new(provider.clone(), QueueConfig::default())
            .with_retry_policy(fast_retry());
        let handle = queue("orders");

        assert!(client
            .receive(&handle, 1, Duration::seconds(30))
            .await
            .is_err());
        assert!(client
            .update_message(
                &handle,
                &MessageId::new(),
                &PopReceipt::new(),
                None,
                Duration::seconds(30),
            )
            .await
            .is_err());

        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_yields_timeout() {
        let provider = Arc::new(ScriptedProvider::slow(std::time::Duration::from_secs(10)));
        let client = QueueClient::new(provider, QueueConfig::default())
            .with_retry_policy(RetryPolicy::disabled())
            .with_deadline(std::time::Duration::from_millis(100));

        let error = client.exists(&queue("orders")).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Timeout);
        assert_eq!(error.operation, Operation::QueueExists);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_deadline_waits_for_provider() {
        let provider = Arc::new(ScriptedProvider::slow(std::time::Duration::from_secs(60)));
        let client = QueueClient::new(provider, QueueConfig::default()).without_deadline();

        assert!(client.exists(&queue("orders")).await.unwrap());
    }
}

//! Tests for provider configuration.

use super::*;

#[test]
fn test_queue_config_defaults() {
    let config = QueueConfig::default();

    assert_eq!(config.provider.provider_type(), ProviderType::InMemory);
    assert_eq!(config.default_timeout_seconds, Some(30));
    assert_eq!(config.max_message_size, 64 * 1024);
    assert_eq!(config.max_batch_size, 32);
    assert_eq!(config.retry.max_attempts, 3);
}

#[test]
fn test_storage_queue_config_defaults() {
    let config = StorageQueueConfig::default();

    assert_eq!(config.api_version, "2021-12-02");
    assert_eq!(config.message_encoding, MessageEncoding::Text);
    assert_eq!(config.request_timeout_seconds, 30);
}

#[test]
fn test_provider_config_deserializes_tagged() {
    let json = r#"{
        "provider": { "type": "storage_queue", "message_encoding": "base64" },
        "max_batch_size": 16
    }"#;

    let config: QueueConfig = serde_json::from_str(json).unwrap();

    match &config.provider {
        ProviderConfig::StorageQueue(storage) => {
            assert_eq!(storage.message_encoding, MessageEncoding::Base64);
            assert_eq!(storage.api_version, "2021-12-02");
        }
        other => panic!("Expected storage queue provider, got: {:?}", other),
    }
    assert_eq!(config.max_batch_size, 16);
    assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
}

#[test]
fn test_in_memory_config_deserializes_with_defaults() {
    let config: QueueConfig =
        serde_json::from_str(r#"{ "provider": { "type": "in_memory", "max_queue_size": 5 } }"#)
            .unwrap();

    match config.provider {
        ProviderConfig::InMemory(memory) => {
            assert_eq!(memory.max_queue_size, 5);
            assert_eq!(memory.default_message_ttl_seconds, Some(7 * 24 * 60 * 60));
        }
        other => panic!("Expected in-memory provider, got: {:?}", other),
    }
}

#[test]
fn test_config_validation() {
    assert!(QueueConfig::default().validate().is_ok());

    let zero_batch = QueueConfig {
        max_batch_size: 0,
        ..Default::default()
    };
    assert!(zero_batch.validate().is_err());

    let oversized_batch = QueueConfig {
        max_batch_size: 33,
        ..Default::default()
    };
    assert!(oversized_batch.validate().is_err());

    let zero_timeout = QueueConfig {
        default_timeout_seconds: Some(0),
        ..Default::default()
    };
    assert!(zero_timeout.validate().is_err());
}

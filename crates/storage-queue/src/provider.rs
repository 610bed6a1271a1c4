//! Provider types and configuration.

use serde::{Deserialize, Serialize};

/// Largest batch a single peek or receive may request
pub const MAX_BATCH_SIZE: u32 = 32;

/// Default upper bound for a message body (64 KiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Enumeration of supported queue providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderType {
    StorageQueue,
    InMemory,
}

/// Configuration for queue client initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub provider: ProviderConfig,
    /// Deadline applied to every operation unless overridden per call
    pub default_timeout_seconds: Option<u64>,
    /// Largest accepted message body in bytes
    pub max_message_size: usize,
    /// Largest peek/receive batch, never above `MAX_BATCH_SIZE`
    pub max_batch_size: u32,
    pub retry: RetryConfig,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::InMemory(InMemoryConfig::default()),
            default_timeout_seconds: Some(30),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_batch_size: MAX_BATCH_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

/// Provider-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    StorageQueue(StorageQueueConfig),
    InMemory(InMemoryConfig),
}

impl ProviderConfig {
    /// Provider selected by this configuration
    pub fn provider_type(&self) -> ProviderType {
        match self {
            Self::StorageQueue(_) => ProviderType::StorageQueue,
            Self::InMemory(_) => ProviderType::InMemory,
        }
    }
}

/// How message bodies are represented on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageEncoding {
    /// XML-escaped UTF-8 text
    #[default]
    Text,
    /// Base64, allows arbitrary bytes
    Base64,
}

/// HTTP storage-queue provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageQueueConfig {
    /// Value sent in the `x-ms-version` header
    pub api_version: String,
    pub message_encoding: MessageEncoding,
    /// Transport-level timeout for a single HTTP request
    pub request_timeout_seconds: u64,
}

impl Default for StorageQueueConfig {
    fn default() -> Self {
        Self {
            api_version: "2021-12-02".to_string(),
            message_encoding: MessageEncoding::Text,
            request_timeout_seconds: 30,
        }
    }
}

/// In-memory provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryConfig {
    /// Messages a single queue may hold before sends are rejected
    pub max_queue_size: usize,
    /// Time-to-live applied when a send uses the service default; `None` keeps
    /// messages forever
    pub default_message_ttl_seconds: Option<u64>,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 10000,
            default_message_ttl_seconds: Some(7 * 24 * 60 * 60),
        }
    }
}

/// Backoff settings for idempotent operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt; zero disables retrying
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub use_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8000,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;

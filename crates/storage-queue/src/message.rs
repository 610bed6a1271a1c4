//! Message types for queue operations including core domain identifiers.

use crate::error::{SerializationError, ValidationError};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Longest invisibility window or initial delay the service accepts
pub const MAX_VISIBILITY_TIMEOUT_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Longest finite time-to-live the service accepts, in seconds
pub const MAX_TIME_TO_LIVE_SECONDS: i64 = i32::MAX as i64;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue name following storage-queue naming rules
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        if name.len() < 3 || name.len() > 63 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: "must be 3-63 characters".to_string(),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only lowercase ASCII letters, digits, and hyphens allowed".to_string(),
            });
        }

        if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "no leading/trailing hyphens or consecutive hyphens".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for QueueName {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<QueueName> for String {
    fn from(value: QueueName) -> Self {
        value.0
    }
}

/// Server-issued identifier of a message, stable for its lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// One-time token authorising a single update or delete of a leased message.
///
/// A new receipt is issued by every receive and every update; the previous
/// one stops being accepted at that moment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PopReceipt(String);

impl PopReceipt {
    /// Issue a fresh random receipt
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Get receipt as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PopReceipt {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for PopReceipt {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "pop_receipt".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Timestamp shifted forward by `duration`, saturating at the latest
    /// representable instant
    pub fn plus(&self, duration: Duration) -> Self {
        self.checked_plus(duration)
            .unwrap_or(Self(DateTime::<Utc>::MAX_UTC))
    }

    /// Timestamp shifted forward by `duration`, or `None` on overflow
    pub fn checked_plus(&self, duration: Duration) -> Option<Self> {
        self.0.checked_add_signed(duration).map(Self)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dt = s.parse::<DateTime<Utc>>()?;
        Ok(Self::from_datetime(dt))
    }
}

fn body_as_text(body: &Bytes) -> Result<&str, SerializationError> {
    std::str::from_utf8(body).map_err(|_| SerializationError::InvalidUtf8)
}

// ============================================================================
// Message Types
// ============================================================================

/// A message received under a lease.
///
/// The record is a snapshot: the receipt may already be stale by the time it
/// is used, because the window can lapse and another receiver can claim the
/// message in between.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub body: Bytes,
    pub pop_receipt: PopReceipt,
    pub visible_at: Timestamp,
    pub dequeue_count: u32,
    pub inserted_at: Timestamp,
    pub expires_at: Option<Timestamp>,
}

impl MessageRecord {
    /// Body decoded as UTF-8 text
    pub fn body_text(&self) -> Result<&str, SerializationError> {
        body_as_text(&self.body)
    }
}

/// A message observed by `peek`; carries no receipt and cannot be updated
/// or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeekedMessage {
    pub message_id: MessageId,
    pub body: Bytes,
    pub dequeue_count: u32,
    pub inserted_at: Timestamp,
    pub expires_at: Option<Timestamp>,
}

impl PeekedMessage {
    /// Body decoded as UTF-8 text
    pub fn body_text(&self) -> Result<&str, SerializationError> {
        body_as_text(&self.body)
    }
}

/// Service acknowledgement of an accepted message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: MessageId,
    pub inserted_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub visible_at: Timestamp,
}

/// New lease issued by a successful update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReceipt {
    pub pop_receipt: PopReceipt,
    pub visible_at: Timestamp,
}

/// Queue-level properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueProperties {
    /// Eventually-consistent estimate; never use for exact accounting
    pub approximate_message_count: u64,
    pub metadata: HashMap<String, String>,
}

// ============================================================================
// Send Options
// ============================================================================

/// Lifetime of a message before the service discards it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeToLive {
    /// Use the service default (seven days for storage queues)
    ServiceDefault,
    /// Expire after the given duration
    After(Duration),
    /// Never expire
    Never,
}

/// Configuration options for sending messages to queues
#[derive(Debug, Clone)]
pub struct SendOptions {
    /// Delay before the message first becomes visible to receivers
    pub visibility_delay: Duration,
    /// Time-to-live for automatic message expiration
    pub time_to_live: TimeToLive,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            visibility_delay: Duration::zero(),
            time_to_live: TimeToLive::ServiceDefault,
        }
    }
}

impl SendOptions {
    /// Create new send options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the message invisible for `delay` after it is accepted
    pub fn with_visibility_delay(mut self, delay: Duration) -> Self {
        self.visibility_delay = delay;
        self
    }

    /// Set time-to-live for message expiration
    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = TimeToLive::After(ttl);
        self
    }

    /// Keep the message until it is deleted
    pub fn never_expire(mut self) -> Self {
        self.time_to_live = TimeToLive::Never;
        self
    }

    /// Check option ranges against the service contract
    pub fn validate(&self) -> Result<(), ValidationError> {
        let delay = self.visibility_delay.num_seconds();
        if self.visibility_delay < Duration::zero() || delay > MAX_VISIBILITY_TIMEOUT_SECONDS {
            return Err(ValidationError::OutOfRange {
                field: "visibility_delay".to_string(),
                message: "must be between 0 seconds and 7 days".to_string(),
            });
        }

        if let TimeToLive::After(ttl) = self.time_to_live {
            if ttl <= Duration::zero() || ttl.num_seconds() > MAX_TIME_TO_LIVE_SECONDS {
                return Err(ValidationError::OutOfRange {
                    field: "time_to_live".to_string(),
                    message: format!(
                        "must be between 1 and {} seconds",
                        MAX_TIME_TO_LIVE_SECONDS
                    ),
                });
            }
            if self.visibility_delay >= ttl {
                return Err(ValidationError::OutOfRange {
                    field: "visibility_delay".to_string(),
                    message: "must be shorter than the time-to-live".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

//! Error types for queue operations.

use crate::message::{MessageId, QueueName};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Abstract classification of every failure a queue operation can produce.
///
/// The classification is independent of the transport: the in-memory service
/// and the HTTP provider map their native failures onto the same kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Queue or message absent
    NotFound,
    /// Pop receipt is stale or was already consumed
    PreconditionFailed,
    /// Message body exceeds the configured size limit
    PayloadTooLarge,
    /// Caller supplied an argument outside the contract
    InvalidArgument,
    /// Endpoint capability was rejected
    Unauthorized,
    /// Service could not be reached or reported a server-side fault
    ServiceUnavailable,
    /// Deadline elapsed before the service answered
    Timeout,
    /// Service answered with something the client could not decode
    Protocol,
}

impl ErrorKind {
    /// Stable name used in log fields and human-readable messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::PreconditionFailed => "PreconditionFailed",
            Self::PayloadTooLarge => "PayloadTooLarge",
            Self::InvalidArgument => "InvalidArgument",
            Self::Unauthorized => "Unauthorized",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::Timeout => "Timeout",
            Self::Protocol => "Protocol",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comprehensive error type for all queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue not found: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("Message not found: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("Pop receipt does not match the current lease of message {message_id}")]
    PopReceiptMismatch { message_id: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Batch size {size} exceeds maximum {max_size}")]
    BatchTooLarge { size: usize, max_size: usize },

    #[error("Provider error ({provider}): {status} {code} - {message}")]
    ProviderError {
        provider: String,
        status: u16,
        code: String,
        message: String,
    },

    #[error("Serialization failed: {0}")]
    SerializationError(#[from] SerializationError),

    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),
}

impl QueueError {
    /// Map the error onto the abstract taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QueueNotFound { .. } => ErrorKind::NotFound,
            Self::MessageNotFound { .. } => ErrorKind::NotFound,
            Self::PopReceiptMismatch { .. } => ErrorKind::PreconditionFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ConnectionFailed { .. } => ErrorKind::ServiceUnavailable,
            Self::AuthenticationFailed { .. } => ErrorKind::Unauthorized,
            Self::MessageTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::BatchTooLarge { .. } => ErrorKind::InvalidArgument,
            Self::ProviderError { status, .. } if *status >= 500 => ErrorKind::ServiceUnavailable,
            Self::ProviderError { code, .. } if code == "QueueBeingDeleted" => {
                ErrorKind::ServiceUnavailable
            }
            Self::ProviderError { status: 413, .. } => ErrorKind::PayloadTooLarge,
            Self::ProviderError { .. } => ErrorKind::InvalidArgument,
            Self::SerializationError(_) => ErrorKind::Protocol,
            Self::ConfigurationError(_) => ErrorKind::InvalidArgument,
            Self::ValidationError(_) => ErrorKind::InvalidArgument,
        }
    }

    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ServiceUnavailable | ErrorKind::Timeout
        )
    }

    /// Check if the error reports an absent queue or message
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Get suggested retry delay
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Timeout { .. } => Some(Duration::from_secs(1)),
            Self::ConnectionFailed { .. } => Some(Duration::from_secs(5)),
            Self::ProviderError { status: 503, .. } => Some(Duration::from_secs(5)),
            _ => None,
        }
    }
}

/// Errors during message body encoding/decoding
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Message body is not valid UTF-8")]
    InvalidUtf8,

    #[error("Message body is not valid base64: {message}")]
    InvalidBase64 { message: String },

    #[error("Malformed XML response: {message}")]
    Xml { message: String },

    #[error("Response is missing element '{element}'")]
    MissingElement { element: String },

    #[error("Invalid value for '{field}': {value}")]
    InvalidValue { field: String, value: String },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

/// Name of a client operation, carried in errors and log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateQueue,
    QueueExists,
    DeleteQueue,
    GetProperties,
    SendMessage,
    PeekMessages,
    ReceiveMessages,
    UpdateMessage,
    DeleteMessage,
}

impl Operation {
    /// Stable name used in log fields and human-readable messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateQueue => "create_if_not_exists",
            Self::QueueExists => "exists",
            Self::DeleteQueue => "delete_queue",
            Self::GetProperties => "get_properties",
            Self::SendMessage => "send",
            Self::PeekMessages => "peek",
            Self::ReceiveMessages => "receive",
            Self::UpdateMessage => "update_message",
            Self::DeleteMessage => "delete_message",
        }
    }

    /// Whether repeating the operation after an indeterminate failure is safe.
    ///
    /// A repeated send may duplicate the message; a repeated receive or update
    /// changes lease state a second time.
    pub fn is_idempotent(&self) -> bool {
        !matches!(
            self,
            Self::SendMessage | Self::ReceiveMessages | Self::UpdateMessage
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed client operation with its target attached
#[derive(Debug, Error)]
#[error(
    "{} on queue '{}'{} failed ({}): {}",
    .operation,
    .queue,
    message_suffix(.message_id),
    .source.kind(),
    .source
)]
pub struct OperationError {
    pub operation: Operation,
    pub queue: QueueName,
    pub message_id: Option<MessageId>,
    #[source]
    pub source: QueueError,
}

fn message_suffix(message_id: &Option<MessageId>) -> String {
    match message_id {
        Some(id) => format!(" message '{}'", id),
        None => String::new(),
    }
}

impl OperationError {
    /// Attach operation context to a provider failure
    pub fn new(
        operation: Operation,
        queue: QueueName,
        message_id: Option<MessageId>,
        source: QueueError,
    ) -> Self {
        Self {
            operation,
            queue,
            message_id,
            source,
        }
    }

    /// Abstract error classification
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// Underlying provider error
    pub fn error(&self) -> &QueueError {
        &self.source
    }

    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        self.source.is_transient()
    }

    /// Check if the error reports an absent queue or message
    pub fn is_not_found(&self) -> bool {
        self.source.is_not_found()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

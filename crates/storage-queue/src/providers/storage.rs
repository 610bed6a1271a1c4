//! Storage-queue provider speaking the queue service REST protocol over HTTP.
//!
//! Each provider call is exactly one HTTP request. Bodies are XML, times are
//! RFC 1123 and errors arrive as an `<Error>` document plus the
//! `x-ms-error-code` header.
//!
//! ## Endpoint
//!
//! The endpoint of a `QueueHandle` is the service base URL, optionally
//! carrying a pre-signed query string:
//!
//! ```text
//! https://account.queue.core.windows.net/?sv=2021-12-02&sig=...
//! http://127.0.0.1:10001/devstoreaccount1
//! ```
//!
//! The query string is forwarded untouched on every request. No request
//! signing happens here.
//!
//! ## Example
//!
//! ```no_run
//! use storage_queue::{QueueClientFactory, QueueConfig, ProviderConfig, StorageQueueConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = QueueConfig {
//!     provider: ProviderConfig::StorageQueue(StorageQueueConfig::default()),
//!     ..Default::default()
//! };
//!
//! let client = QueueClientFactory::create_client(config)?;
//! # Ok(())
//! # }
//! ```

use crate::client::{CreateOutcome, QueueProvider};
use crate::error::{ConfigurationError, QueueError, SerializationError};
use crate::handle::{Endpoint, QueueHandle};
use crate::message::{
    MessageId, MessageRecord, PeekedMessage, PopReceipt, QueueProperties, SendOptions,
    SendReceipt, TimeToLive, Timestamp, UpdateReceipt,
};
use crate::provider::{
    MessageEncoding, ProviderType, StorageQueueConfig, DEFAULT_MAX_MESSAGE_SIZE, MAX_BATCH_SIZE,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use chrono::{DateTime, Datelike, Duration, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::header::HeaderMap;
use reqwest::{Client as HttpClient, Method, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use url::Url;

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;

const PROVIDER_NAME: &str = "storage_queue";
const METADATA_HEADER_PREFIX: &str = "x-ms-meta-";

// ============================================================================
// Error Types
// ============================================================================

/// Storage-queue specific errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Pop receipt mismatch for message {0}")]
    PopReceiptMismatch(String),

    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Service error: {status} {code} - {message}")]
    ServiceError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] SerializationError),
}

impl StorageError {
    /// Map storage error to QueueError
    pub fn to_queue_error(self) -> QueueError {
        match self {
            Self::Authentication(message) => QueueError::AuthenticationFailed { message },
            Self::NetworkError(message) => QueueError::ConnectionFailed { message },
            Self::Timeout(duration) => QueueError::Timeout { duration },
            Self::QueueNotFound(queue_name) => QueueError::QueueNotFound { queue_name },
            Self::MessageNotFound(message_id) => QueueError::MessageNotFound { message_id },
            Self::PopReceiptMismatch(message_id) => QueueError::PopReceiptMismatch { message_id },
            Self::MessageTooLarge { size, max_size } => {
                QueueError::MessageTooLarge { size, max_size }
            }
            Self::ServiceError {
                status,
                code,
                message,
            } => QueueError::ProviderError {
                provider: PROVIDER_NAME.to_string(),
                status,
                code,
                message,
            },
            Self::ConfigurationError(message) => {
                QueueError::ConfigurationError(ConfigurationError::Invalid { message })
            }
            Self::SerializationError(error) => QueueError::SerializationError(error),
        }
    }
}

/// Target of a request, used to pick the right not-found error
#[derive(Clone, Copy)]
enum Resource<'a> {
    Queue(&'a QueueHandle),
    Message(&'a QueueHandle, &'a MessageId),
}

/// Successful response with the body already read
struct StorageResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl StorageResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    fn required_header(&self, name: &str) -> Result<&str, StorageError> {
        self.header(name).ok_or_else(|| {
            SerializationError::MissingElement {
                element: name.to_string(),
            }
            .into()
        })
    }
}

// ============================================================================
// Storage Queue Provider
// ============================================================================

/// HTTP storage-queue provider implementation
///
/// ## Thread Safety
///
/// The provider holds only an HTTP connection pool and its configuration. It
/// can be shared across async tasks using `Arc`.
pub struct StorageQueueProvider {
    http_client: HttpClient,
    config: StorageQueueConfig,
    request_timeout: std::time::Duration,
}

impl StorageQueueProvider {
    /// Create new storage-queue provider
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: StorageQueueConfig) -> Result<Self, StorageError> {
        if config.api_version.trim().is_empty() {
            return Err(StorageError::ConfigurationError(
                "api_version cannot be empty".to_string(),
            ));
        }
        if config.request_timeout_seconds == 0 {
            return Err(StorageError::ConfigurationError(
                "request_timeout_seconds must be positive".to_string(),
            ));
        }

        let request_timeout = std::time::Duration::from_secs(config.request_timeout_seconds);
        let http_client = HttpClient::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| StorageError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
            request_timeout,
        })
    }

    /// Build the URL of a queue resource, keeping any pre-signed query
    fn resource_url(
        &self,
        endpoint: &Endpoint,
        segments: &[&str],
        params: &[(&str, String)],
    ) -> Result<Url, StorageError> {
        let mut url = Url::parse(endpoint.expose().trim())
            .map_err(|e| StorageError::ConfigurationError(format!("Invalid endpoint URL: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| {
                StorageError::ConfigurationError("Endpoint URL cannot be a base".to_string())
            })?
            .pop_if_empty()
            .extend(segments);

        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(key, value)| (*key, value.as_str())));
        }

        Ok(url)
    }

    fn queue_url(
        &self,
        queue: &QueueHandle,
        params: &[(&str, String)],
    ) -> Result<Url, StorageError> {
        self.resource_url(queue.endpoint(), &[queue.name().as_str()], params)
    }

    fn messages_url(
        &self,
        queue: &QueueHandle,
        params: &[(&str, String)],
    ) -> Result<Url, StorageError> {
        self.resource_url(
            queue.endpoint(),
            &[queue.name().as_str(), "messages"],
            params,
        )
    }

    fn message_url(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        params: &[(&str, String)],
    ) -> Result<Url, StorageError> {
        self.resource_url(
            queue.endpoint(),
            &[queue.name().as_str(), "messages", message_id.as_str()],
            params,
        )
    }

    /// Make an HTTP request to the queue service
    async fn make_request(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
        resource: Resource<'_>,
    ) -> Result<StorageResponse, StorageError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        debug!(
            method = %method,
            path = url.path(),
            request_id = %request_id,
            "Sending storage queue request"
        );

        let mut request = self
            .http_client
            .request(method, url)
            .header("x-ms-version", self.config.api_version.as_str())
            .header("x-ms-date", format_http_date(Utc::now()))
            .header("x-ms-client-request-id", request_id.as_str());

        if let Some(body) = body {
            request = request.header("content-type", "application/xml").body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StorageError::Timeout(self.request_timeout)
            } else if e.is_connect() {
                StorageError::NetworkError(format!("Connection failed: {}", e))
            } else {
                StorageError::NetworkError(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                StorageError::Timeout(self.request_timeout)
            } else {
                StorageError::NetworkError(format!("Failed to read response body: {}", e))
            }
        })?;

        if !status.is_success() {
            return Err(parse_error_response(status, &headers, &body, resource));
        }

        Ok(StorageResponse {
            status,
            headers,
            body,
        })
    }

    // ------------------------------------------------------------------------
    // Body encoding
    // ------------------------------------------------------------------------

    fn encode_body(&self, body: &Bytes) -> Result<String, StorageError> {
        let text = match self.config.message_encoding {
            MessageEncoding::Text => {
                let text = std::str::from_utf8(body).map_err(|_| SerializationError::InvalidUtf8)?;
                quick_xml::escape::escape(text).into_owned()
            }
            MessageEncoding::Base64 => STANDARD.encode(body),
        };

        if text.len() > DEFAULT_MAX_MESSAGE_SIZE {
            return Err(StorageError::MessageTooLarge {
                size: text.len(),
                max_size: DEFAULT_MAX_MESSAGE_SIZE,
            });
        }

        Ok(format!(
            "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            text
        ))
    }

    fn decode_body(&self, text: &str) -> Result<Bytes, StorageError> {
        match self.config.message_encoding {
            MessageEncoding::Text => Ok(Bytes::from(text.to_string())),
            MessageEncoding::Base64 => STANDARD
                .decode(text)
                .map(Bytes::from)
                .map_err(|e| {
                    SerializationError::InvalidBase64 {
                        message: e.to_string(),
                    }
                    .into()
                }),
        }
    }

    // ------------------------------------------------------------------------
    // Response conversion
    // ------------------------------------------------------------------------

    fn to_send_receipt(&self, fields: &HashMap<String, String>) -> Result<SendReceipt, StorageError> {
        Ok(SendReceipt {
            message_id: parse_field(fields, "MessageId")?,
            inserted_at: parse_time_field(fields, "InsertionTime")?,
            expires_at: parse_expiry(fields)?,
            visible_at: parse_time_field(fields, "TimeNextVisible")?,
        })
    }

    fn to_message_record(
        &self,
        fields: &HashMap<String, String>,
    ) -> Result<MessageRecord, StorageError> {
        Ok(MessageRecord {
            message_id: parse_field(fields, "MessageId")?,
            body: self.decode_body(required_field(fields, "MessageText")?)?,
            pop_receipt: parse_field(fields, "PopReceipt")?,
            visible_at: parse_time_field(fields, "TimeNextVisible")?,
            dequeue_count: parse_field(fields, "DequeueCount")?,
            inserted_at: parse_time_field(fields, "InsertionTime")?,
            expires_at: parse_expiry(fields)?,
        })
    }

    fn to_peeked_message(
        &self,
        fields: &HashMap<String, String>,
    ) -> Result<PeekedMessage, StorageError> {
        Ok(PeekedMessage {
            message_id: parse_field(fields, "MessageId")?,
            body: self.decode_body(required_field(fields, "MessageText")?)?,
            dequeue_count: parse_field(fields, "DequeueCount")?,
            inserted_at: parse_time_field(fields, "InsertionTime")?,
            expires_at: parse_expiry(fields)?,
        })
    }

    // ------------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------------

    async fn create(&self, queue: &QueueHandle) -> Result<CreateOutcome, StorageError> {
        let url = self.queue_url(queue, &[])?;
        match self
            .make_request(Method::PUT, url, None, Resource::Queue(queue))
            .await
        {
            Ok(response) if response.status == StatusCode::CREATED => Ok(CreateOutcome::Created),
            Ok(_) => Ok(CreateOutcome::AlreadyExists),
            Err(StorageError::ServiceError { code, .. }) if code == "QueueAlreadyExists" => {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    async fn metadata(&self, queue: &QueueHandle) -> Result<StorageResponse, StorageError> {
        let url = self.queue_url(queue, &[("comp", "metadata".to_string())])?;
        self.make_request(Method::GET, url, None, Resource::Queue(queue))
            .await
    }

    async fn exists(&self, queue: &QueueHandle) -> Result<bool, StorageError> {
        match self.metadata(queue).await {
            Ok(_) => Ok(true),
            Err(StorageError::QueueNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn properties(&self, queue: &QueueHandle) -> Result<QueueProperties, StorageError> {
        let response = self.metadata(queue).await?;

        let count = response.required_header("x-ms-approximate-messages-count")?;
        let approximate_message_count = count.parse::<u64>().map_err(|_| {
            SerializationError::InvalidValue {
                field: "x-ms-approximate-messages-count".to_string(),
                value: count.to_string(),
            }
        })?;

        let metadata = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                let key = name.as_str().strip_prefix(METADATA_HEADER_PREFIX)?;
                let value = value.to_str().ok()?;
                Some((key.to_string(), value.to_string()))
            })
            .collect();

        Ok(QueueProperties {
            approximate_message_count,
            metadata,
        })
    }

    async fn send(
        &self,
        queue: &QueueHandle,
        body: &Bytes,
        options: &SendOptions,
    ) -> Result<SendReceipt, StorageError> {
        let payload = self.encode_body(body)?;

        let mut params = Vec::new();
        if options.visibility_delay > Duration::zero() {
            params.push((
                "visibilitytimeout",
                options.visibility_delay.num_seconds().to_string(),
            ));
        }
        match options.time_to_live {
            TimeToLive::ServiceDefault => {}
            TimeToLive::After(ttl) => params.push(("messagettl", ttl.num_seconds().to_string())),
            TimeToLive::Never => params.push(("messagettl", "-1".to_string())),
        }

        let url = self.messages_url(queue, &params)?;
        let response = self
            .make_request(Method::POST, url, Some(payload), Resource::Queue(queue))
            .await?;

        let messages = parse_elements(&response.body, b"QueueMessage")?;
        let fields = messages
            .first()
            .ok_or_else(|| SerializationError::MissingElement {
                element: "QueueMessage".to_string(),
            })?;
        self.to_send_receipt(fields)
    }

    async fn peek(
        &self,
        queue: &QueueHandle,
        max_messages: u32,
    ) -> Result<Vec<PeekedMessage>, StorageError> {
        let url = self.messages_url(
            queue,
            &[
                ("peekonly", "true".to_string()),
                ("numofmessages", max_messages.to_string()),
            ],
        )?;
        let response = self
            .make_request(Method::GET, url, None, Resource::Queue(queue))
            .await?;

        parse_elements(&response.body, b"QueueMessage")?
            .iter()
            .map(|fields| self.to_peeked_message(fields))
            .collect()
    }

    async fn receive(
        &self,
        queue: &QueueHandle,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let url = self.messages_url(
            queue,
            &[
                ("numofmessages", max_messages.to_string()),
                (
                    "visibilitytimeout",
                    visibility_timeout.num_seconds().to_string(),
                ),
            ],
        )?;
        let response = self
            .make_request(Method::GET, url, None, Resource::Queue(queue))
            .await?;

        parse_elements(&response.body, b"QueueMessage")?
            .iter()
            .map(|fields| self.to_message_record(fields))
            .collect()
    }

    async fn update(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
        body: Option<&Bytes>,
        visibility_timeout: Duration,
    ) -> Result<UpdateReceipt, StorageError> {
        let payload = body.map(|body| self.encode_body(body)).transpose()?;
        let url = self.message_url(
            queue,
            message_id,
            &[
                ("popreceipt", pop_receipt.as_str().to_string()),
                (
                    "visibilitytimeout",
                    visibility_timeout.num_seconds().to_string(),
                ),
            ],
        )?;
        let response = self
            .make_request(
                Method::PUT,
                url,
                payload,
                Resource::Message(queue, message_id),
            )
            .await?;

        let receipt = response.required_header("x-ms-popreceipt")?;
        let visible_at = response.required_header("x-ms-time-next-visible")?;

        Ok(UpdateReceipt {
            pop_receipt: PopReceipt::from_str(receipt).map_err(|_| {
                SerializationError::InvalidValue {
                    field: "x-ms-popreceipt".to_string(),
                    value: receipt.to_string(),
                }
            })?,
            visible_at: parse_http_date("x-ms-time-next-visible", visible_at)?,
        })
    }

    async fn delete(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<(), StorageError> {
        let url = self.message_url(
            queue,
            message_id,
            &[("popreceipt", pop_receipt.as_str().to_string())],
        )?;
        self.make_request(
            Method::DELETE,
            url,
            None,
            Resource::Message(queue, message_id),
        )
        .await?;
        Ok(())
    }
}

impl fmt::Debug for StorageQueueProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageQueueProvider")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl QueueProvider for StorageQueueProvider {
    async fn create_queue(&self, queue: &QueueHandle) -> Result<CreateOutcome, QueueError> {
        self.create(queue).await.map_err(StorageError::to_queue_error)
    }

    async fn queue_exists(&self, queue: &QueueHandle) -> Result<bool, QueueError> {
        self.exists(queue).await.map_err(StorageError::to_queue_error)
    }

    async fn delete_queue(&self, queue: &QueueHandle) -> Result<(), QueueError> {
        let url = self
            .queue_url(queue, &[])
            .map_err(StorageError::to_queue_error)?;
        self.make_request(Method::DELETE, url, None, Resource::Queue(queue))
            .await
            .map(|_| ())
            .map_err(StorageError::to_queue_error)
    }

    async fn get_properties(&self, queue: &QueueHandle) -> Result<QueueProperties, QueueError> {
        self.properties(queue)
            .await
            .map_err(StorageError::to_queue_error)
    }

    async fn send_message(
        &self,
        queue: &QueueHandle,
        body: &Bytes,
        options: &SendOptions,
    ) -> Result<SendReceipt, QueueError> {
        self.send(queue, body, options)
            .await
            .map_err(StorageError::to_queue_error)
    }

    async fn peek_messages(
        &self,
        queue: &QueueHandle,
        max_messages: u32,
    ) -> Result<Vec<PeekedMessage>, QueueError> {
        self.peek(queue, max_messages)
            .await
            .map_err(StorageError::to_queue_error)
    }

    async fn receive_messages(
        &self,
        queue: &QueueHandle,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<MessageRecord>, QueueError> {
        self.receive(queue, max_messages, visibility_timeout)
            .await
            .map_err(StorageError::to_queue_error)
    }

    async fn update_message(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
        body: Option<&Bytes>,
        visibility_timeout: Duration,
    ) -> Result<UpdateReceipt, QueueError> {
        self.update(queue, message_id, pop_receipt, body, visibility_timeout)
            .await
            .map_err(StorageError::to_queue_error)
    }

    async fn delete_message(
        &self,
        queue: &QueueHandle,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<(), QueueError> {
        self.delete(queue, message_id, pop_receipt)
            .await
            .map_err(StorageError::to_queue_error)
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::StorageQueue
    }

    fn max_batch_size(&self) -> u32 {
        MAX_BATCH_SIZE
    }
}

// ============================================================================
// XML and header parsing
// ============================================================================

/// Collect the child elements of every `container` element as name/text maps
fn parse_elements(
    xml: &str,
    container: &[u8],
) -> Result<Vec<HashMap<String, String>>, SerializationError> {
    let mut reader = Reader::from_str(xml);
    // Whitespace inside MessageText is part of the body
    reader.trim_text(false);

    let mut elements = Vec::new();
    let mut current: Option<HashMap<String, String>> = None;
    let mut field: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == container => {
                current = Some(HashMap::new());
            }
            Ok(Event::Start(ref e)) => {
                if let Some(fields) = current.as_mut() {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    fields.insert(name.clone(), String::new());
                    field = Some(name);
                }
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(fields) = current.as_mut() {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    fields.insert(name, String::new());
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(fields), Some(name)) = (current.as_mut(), field.as_ref()) {
                    let text = e.unescape().map_err(xml_error)?;
                    if let Some(value) = fields.get_mut(name) {
                        value.push_str(&text);
                    }
                }
            }
            Ok(Event::CData(e)) => {
                if let (Some(fields), Some(name)) = (current.as_mut(), field.as_ref()) {
                    if let Some(value) = fields.get_mut(name) {
                        value.push_str(&String::from_utf8_lossy(&e));
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                field = None;
                if e.name().as_ref() == container {
                    if let Some(fields) = current.take() {
                        elements.push(fields);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(elements)
}

fn xml_error(error: quick_xml::Error) -> SerializationError {
    SerializationError::Xml {
        message: error.to_string(),
    }
}

/// Parse error response from headers and XML body
fn parse_error_response(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    resource: Resource<'_>,
) -> StorageError {
    let document = parse_elements(body, b"Error")
        .ok()
        .and_then(|mut errors| errors.pop())
        .unwrap_or_default();

    let code = headers
        .get("x-ms-error-code")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| document.get("Code").cloned())
        .unwrap_or_else(|| "Unknown".to_string());
    let message = document
        .get("Message")
        .map(|message| message.lines().next().unwrap_or_default().to_string())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    let queue_name = match &resource {
        Resource::Queue(queue) | Resource::Message(queue, _) => queue.name().to_string(),
    };

    match code.as_str() {
        "QueueNotFound" => StorageError::QueueNotFound(queue_name),
        "MessageNotFound" => match resource {
            Resource::Message(_, message_id) => StorageError::MessageNotFound(message_id.to_string()),
            Resource::Queue(_) => StorageError::MessageNotFound(message),
        },
        "PopReceiptMismatch" => match resource {
            Resource::Message(_, message_id) => {
                StorageError::PopReceiptMismatch(message_id.to_string())
            }
            Resource::Queue(_) => StorageError::PopReceiptMismatch(message),
        },
        "AuthenticationFailed" | "AuthorizationFailure" | "InsufficientAccountPermissions" => {
            StorageError::Authentication(format!("{}: {}", code, message))
        }
        _ if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN => {
            StorageError::Authentication(format!("{}: {}", code, message))
        }
        _ if status == StatusCode::NOT_FOUND => match resource {
            Resource::Message(_, message_id) => StorageError::MessageNotFound(message_id.to_string()),
            Resource::Queue(_) => StorageError::QueueNotFound(queue_name),
        },
        _ => StorageError::ServiceError {
            status: status.as_u16(),
            code,
            message,
        },
    }
}

fn required_field<'a>(
    fields: &'a HashMap<String, String>,
    name: &str,
) -> Result<&'a str, SerializationError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| SerializationError::MissingElement {
            element: name.to_string(),
        })
}

fn parse_field<T: FromStr>(
    fields: &HashMap<String, String>,
    name: &str,
) -> Result<T, SerializationError> {
    let value = required_field(fields, name)?;
    value.trim().parse().map_err(|_| SerializationError::InvalidValue {
        field: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_time_field(
    fields: &HashMap<String, String>,
    name: &str,
) -> Result<Timestamp, SerializationError> {
    parse_http_date(name, required_field(fields, name)?)
}

/// `ExpirationTime`, where the far-future sentinel means the message never expires
fn parse_expiry(fields: &HashMap<String, String>) -> Result<Option<Timestamp>, SerializationError> {
    match fields.get("ExpirationTime") {
        None => Ok(None),
        Some(value) => {
            let expires_at = parse_http_date("ExpirationTime", value)?;
            if expires_at.as_datetime().year() >= 9999 {
                Ok(None)
            } else {
                Ok(Some(expires_at))
            }
        }
    }
}

/// Parse an RFC 1123 date such as `Fri, 09 Oct 2009 21:04:30 GMT`
fn parse_http_date(field: &str, value: &str) -> Result<Timestamp, SerializationError> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|dt| Timestamp::from_datetime(dt.with_timezone(&Utc)))
        .map_err(|_| SerializationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn format_http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

//! Queue handles and the opaque endpoint capability they carry.

use crate::error::ValidationError;
use crate::message::QueueName;
use std::fmt;
use std::sync::Arc;

/// Opaque connection capability for a queue service.
///
/// The value is supplied by the caller already resolved (connection string,
/// account URL with a pre-signed query, ...). It is only checked for being
/// non-empty; providers interpret it. It has no `Display` and its `Debug`
/// output is redacted so it never ends up in logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(Arc<str>);

impl Endpoint {
    /// Wrap a capability string
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "endpoint".to_string(),
            });
        }

        Ok(Self(Arc::from(value)))
    }

    /// Raw capability value, for providers only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Endpoint(<redacted>)")
    }
}

/// Identifies one named queue and the endpoint it lives behind.
///
/// Creating a handle does not touch the service; whether the queue exists is
/// a separate fact queried with `QueueClient::exists`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueHandle {
    name: QueueName,
    endpoint: Endpoint,
}

impl QueueHandle {
    /// Create a handle for `name` behind `endpoint`
    pub fn new(name: QueueName, endpoint: Endpoint) -> Self {
        Self { name, endpoint }
    }

    /// Validate `name` and create a handle for it
    pub fn parse(name: &str, endpoint: Endpoint) -> Result<Self, ValidationError> {
        Ok(Self::new(QueueName::new(name.to_string())?, endpoint))
    }

    /// Queue name
    pub fn name(&self) -> &QueueName {
        &self.name
    }

    /// Endpoint capability
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;

//! Gateway error types.

use thiserror::Error;

/// Errors from remote gateways.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No license key is configured for an endpoint that requires one.
    #[error("No license key configured")]
    MissingLicense,

    /// The vendor rejected the license (HTTP 401).
    #[error("{operation}: license rejected")]
    Unauthorized { operation: &'static str },

    /// The vendor answered with a non-success status.
    #[error("{operation}: HTTP {status}: {message}")]
    Status {
        operation: &'static str,
        status: u16,
        message: String,
    },

    /// The requested resource does not exist (HTTP 404).
    #[error("{operation}: not found: {message}")]
    NotFound {
        operation: &'static str,
        message: String,
    },

    /// Connection-level failure (DNS, refused, reset, TLS).
    #[error("{operation}: transport error: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: request timed out")]
    Timeout { operation: &'static str },

    /// The circuit breaker is open; no request was sent.
    #[error("Vendor circuit open, retry in {retry_after_secs}s")]
    CircuitOpen { retry_after_secs: u64 },

    /// The response body could not be decoded.
    #[error("{operation}: invalid response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl GatewayError {
    /// Whether the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Transport { .. }
            | GatewayError::Timeout { .. }
            | GatewayError::CircuitOpen { .. } => true,
            GatewayError::Status { status, .. } => is_retryable_status(*status),
            GatewayError::MissingLicense
            | GatewayError::Unauthorized { .. }
            | GatewayError::NotFound { .. }
            | GatewayError::Decode { .. } => false,
        }
    }

    /// HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Unauthorized { .. } => Some(401),
            GatewayError::NotFound { .. } => Some(404),
            GatewayError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure says something about the vendor's health
    /// (as opposed to this particular request).
    pub(crate) fn counts_against_circuit(&self) -> bool {
        match self {
            GatewayError::Transport { .. } | GatewayError::Timeout { .. } => true,
            GatewayError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Statuses worth retrying: gateway errors, throttling and request timeout.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Errors from a [`super::ContentSink`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PublishError {
    pub message: String,
    /// Whether publishing the same record again may succeed.
    pub retryable: bool,
}

impl PublishError {
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }
}

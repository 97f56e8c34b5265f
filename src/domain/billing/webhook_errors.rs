//! Webhook error types.
//!
//! Every failure the payment webhook can hit, with the HTTP status the
//! provider sees. The status decides whether the provider redelivers:
//! 2xx acknowledges, 4xx rejects for good, 5xx asks for a retry.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed timestamp is older than the tolerance window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Signed body could not be parsed.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Required field missing from webhook payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Event was intentionally not applied (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),

    /// The subscription never showed up within the poll budget.
    #[error("Subscription {subscription_id} not found after {attempts} attempts")]
    LookupExhausted {
        subscription_id: String,
        attempts: u32,
    },

    /// Local store failed.
    #[error("Store error: {0}")]
    Store(String),
}

impl WebhookError {
    /// Returns true if the provider should redeliver this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Store(_))
    }

    /// Returns true if the event is acknowledged despite not being applied.
    pub fn is_acknowledged(&self) -> bool {
        matches!(
            self,
            WebhookError::Ignored(_) | WebhookError::LookupExhausted { .. }
        )
    }

    /// Stable machine-readable code for response bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::InvalidSignature => "INVALID_SIGNATURE",
            WebhookError::TimestampOutOfRange => "TIMESTAMP_OUT_OF_RANGE",
            WebhookError::InvalidTimestamp => "INVALID_TIMESTAMP",
            WebhookError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            WebhookError::MissingField(_) => "MISSING_FIELD",
            WebhookError::Ignored(_) => "IGNORED",
            WebhookError::LookupExhausted { .. } => "LOOKUP_EXHAUSTED",
            WebhookError::Store(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Maps the error to the HTTP status returned to the provider.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Rejected at the boundary, never processed
            WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::MalformedPayload(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,

            WebhookError::Ignored(_) | WebhookError::LookupExhausted { .. } => StatusCode::OK,

            WebhookError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        match err.code {
            // A concurrent delivery closed the subscription first.
            ErrorCode::InvalidStateTransition => WebhookError::Ignored(err.to_string()),
            _ => WebhookError::Store(err.to_string()),
        }
    }
}

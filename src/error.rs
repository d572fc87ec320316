//! Error taxonomy for the messaging core.
//!
//! `MessagingError` is the public, caller-facing taxonomy; `StoreError` is
//! what the store seam speaks. Retryable conflicts are handled inside the
//! domain services and never reach a caller.

use thiserror::Error;

pub type Result<T, E = MessagingError> = std::result::Result<T, E>;

/// Caller-facing errors returned by services, handlers and the gateway.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MessagingError {
    /// Stable machine-readable code carried on wire error events.
    pub fn code(&self) -> &'static str {
        match self {
            MessagingError::Authentication(_) => "authentication_error",
            MessagingError::Authorization(_) => "authorization_error",
            MessagingError::NotFound(_) => "not_found",
            MessagingError::Validation(_) => "validation_error",
            MessagingError::ServiceUnavailable(_) => "service_unavailable",
            MessagingError::Internal(_) => "internal_error",
        }
    }
}

/// Errors from the conversation/message store seam.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient duplicate-key race; callers retry with the same arguments.
    #[error("conflicting write for key {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for MessagingError {
    fn from(err: StoreError) -> Self {
        match err {
            // A conflict that escapes the retry loop means the store could
            // not settle; surface it as unavailability, never as a conflict.
            StoreError::Conflict(key) => {
                MessagingError::ServiceUnavailable(format!("unresolved write conflict for {key}"))
            }
            StoreError::NotFound(what) => MessagingError::NotFound(what),
            StoreError::Unavailable(reason) => MessagingError::ServiceUnavailable(reason),
        }
    }
}

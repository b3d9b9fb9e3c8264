//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these. Classification drives the
//! retry policy: only `Network` and `ServerFault` are transient; `NotFound`
//! and `Conflict` are control signals, not faults.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response received (connect failure, timeout). Retryable.
    #[error("network error: {0}")]
    Network(String),

    /// Credential rejected even after the one-shot token refresh.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Resource does not exist. Expected control signal ("need to create").
    #[error("not found: {0}")]
    NotFound(String),

    /// Resource already exists. Expected control signal, success-equivalent.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backend fault (5xx). Retryable a bounded number of times.
    #[error("server fault ({status}): {message}")]
    ServerFault { status: u16, message: String },

    /// Request rejected (4xx other than auth). Never retried.
    #[error("request rejected ({status}): {message}")]
    Validation { status: u16, message: String },
}

impl ApiError {
    /// True for failures worth another attempt. Control signals and
    /// validation errors must not be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::ServerFault { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ApiError::Network("timeout".into()).is_transient());
        assert!(
            ApiError::ServerFault {
                status: 502,
                message: "bad gateway".into()
            }
            .is_transient()
        );

        assert!(!ApiError::NotFound("no analysis".into()).is_transient());
        assert!(!ApiError::Conflict("already exists".into()).is_transient());
        assert!(!ApiError::Auth("expired".into()).is_transient());
        assert!(
            !ApiError::Validation {
                status: 400,
                message: "bad request".into()
            }
            .is_transient()
        );
    }
}

// Remote suggestion service error types

use crate::error::ErrorCode;
use log::error;
use thiserror::Error;

/// Suggestion error code constants
///
/// Error code range: 5001-5005
pub struct SuggestionErrorCodes;

impl SuggestionErrorCodes {
    /// Network failure reaching the service
    pub const CONNECTION: i32 = 5001;

    /// Service answered with a non-success status
    pub const API: i32 = 5002;

    /// Response could not be parsed into suggestions
    pub const INVALID_RESPONSE: i32 = 5003;

    /// Service did not answer in time
    pub const TIMEOUT: i32 = 5004;

    /// Caller cancelled the request
    pub const CANCELLED: i32 = 5005;
}

/// Log a suggestion service error with structured context
pub fn log_suggestion_error(err: &SuggestionError, context: &str) {
    error!(
        "Suggestion error in {}: code={}, component=SuggestionService, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors crossing the remote suggestion boundary.
///
/// Network and schema failures collapse into this single typed failure;
/// user-facing messaging is the caller's concern.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SuggestionError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,
}

impl SuggestionError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SuggestionError::Connection(_) | SuggestionError::Timeout => true,
            SuggestionError::Api { status, .. } => *status == 429 || *status >= 500,
            SuggestionError::InvalidResponse(_) | SuggestionError::Cancelled => false,
        }
    }
}

impl ErrorCode for SuggestionError {
    fn code(&self) -> i32 {
        match self {
            SuggestionError::Connection(_) => SuggestionErrorCodes::CONNECTION,
            SuggestionError::Api { .. } => SuggestionErrorCodes::API,
            SuggestionError::InvalidResponse(_) => SuggestionErrorCodes::INVALID_RESPONSE,
            SuggestionError::Timeout => SuggestionErrorCodes::TIMEOUT,
            SuggestionError::Cancelled => SuggestionErrorCodes::CANCELLED,
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SuggestionError::Timeout.is_transient());
        assert!(SuggestionError::Connection("reset".into()).is_transient());
        assert!(SuggestionError::Api {
            status: 503,
            message: "busy".into()
        }
        .is_transient());
        assert!(!SuggestionError::Api {
            status: 400,
            message: "bad prompt".into()
        }
        .is_transient());
        assert!(!SuggestionError::InvalidResponse("not json".into()).is_transient());
        assert!(!SuggestionError::Cancelled.is_transient());
    }

    #[test]
    fn test_suggestion_error_codes() {
        assert_eq!(SuggestionError::Timeout.code(), SuggestionErrorCodes::TIMEOUT);
        assert_eq!(
            SuggestionError::Api {
                status: 500,
                message: "x".into()
            }
            .code(),
            5002
        );
        assert!(SuggestionError::Api {
            status: 502,
            message: "gateway".into()
        }
        .message()
        .contains("502"));
    }
}

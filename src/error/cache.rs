// Analysis cache persistence error types

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Cache error code constants
///
/// Error code range: 3001-3004
pub struct CacheErrorCodes;

impl CacheErrorCodes {
    /// Reading or writing the durable store failed
    pub const IO: i32 = 3001;

    /// Persisted blob could not be encoded or decoded
    pub const SERIALIZATION: i32 = 3002;

    /// Persisted blob carries an unknown version tag
    pub const VERSION_MISMATCH: i32 = 3003;

    /// Cache lock was poisoned
    pub const LOCK_POISONED: i32 = 3004;
}

/// Log a cache error with structured context
///
/// Cache errors are never fatal, so they are reported at WARN.
pub fn log_cache_error(err: &CacheError, context: &str) {
    warn!(
        "Cache error in {}: code={}, component=AnalysisCache, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Durable-store failures for the analysis cache
#[derive(Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Filesystem failure
    Io { details: String },

    /// JSON encode/decode failure
    Serialization { details: String },

    /// Persisted version tag does not match this build
    VersionMismatch { expected: String, found: String },

    /// Cache lock was poisoned
    LockPoisoned,
}

impl ErrorCode for CacheError {
    fn code(&self) -> i32 {
        match self {
            CacheError::Io { .. } => CacheErrorCodes::IO,
            CacheError::Serialization { .. } => CacheErrorCodes::SERIALIZATION,
            CacheError::VersionMismatch { .. } => CacheErrorCodes::VERSION_MISMATCH,
            CacheError::LockPoisoned => CacheErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            CacheError::Io { details } => format!("Cache I/O failed: {}", details),
            CacheError::Serialization { details } => {
                format!("Cache serialization failed: {}", details)
            }
            CacheError::VersionMismatch { expected, found } => {
                format!("Cache version mismatch: expected {}, found {}", expected, found)
            }
            CacheError::LockPoisoned => "Cache lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io {
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: CacheError = io_err.into();
        assert_eq!(err.code(), CacheErrorCodes::IO);
        assert!(err.message().contains("read-only"));
    }

    #[test]
    fn test_version_mismatch_message() {
        let err = CacheError::VersionMismatch {
            expected: "3".into(),
            found: "1".into(),
        };
        assert_eq!(err.code(), 3003);
        assert_eq!(err.message(), "Cache version mismatch: expected 3, found 1");
    }
}

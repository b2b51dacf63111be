// Analysis pipeline error types and constants

use crate::error::{ErrorCode, SuggestionError};
use log::error;
use std::fmt;

/// Analysis error code constants
///
/// These constants provide a single source of truth for error codes
/// reported by the extraction/summarization pipeline.
///
/// Error code range: 1001-1006
pub struct AnalysisErrorCodes;

impl AnalysisErrorCodes {
    /// Sample rate is zero or otherwise unusable
    pub const INVALID_SAMPLE_RATE: i32 = 1001;

    /// Configuration values are structurally impossible
    pub const INVALID_CONFIG: i32 = 1002;

    /// Analysis was cancelled by the caller
    pub const CANCELLED: i32 = 1003;

    /// An analysis for the same track is already running
    pub const ALREADY_IN_PROGRESS: i32 = 1004;

    /// The remote suggestion service failed
    pub const SUGGESTION_FAILED: i32 = 1005;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1006;
}

/// Log an analysis error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_analysis_error(err: &AnalysisError, context: &str) {
    error!(
        "Analysis error in {}: code={}, component=AnalysisPipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Analysis-related errors
///
/// Silence and empty buffers are valid input and never produce these;
/// they cover configuration mistakes, cancellation, and remote failures.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Sample rate must be greater than zero
    InvalidSampleRate { sample_rate: u32 },

    /// Configuration rejected by validation
    InvalidConfig { reason: String },

    /// Cancellation token fired at a suspension point
    Cancelled,

    /// Duplicate analysis request for a track already in flight
    AlreadyInProgress { track_id: String },

    /// Remote suggestion call failed
    Suggestion(SuggestionError),

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for AnalysisError {
    fn code(&self) -> i32 {
        match self {
            AnalysisError::InvalidSampleRate { .. } => AnalysisErrorCodes::INVALID_SAMPLE_RATE,
            AnalysisError::InvalidConfig { .. } => AnalysisErrorCodes::INVALID_CONFIG,
            AnalysisError::Cancelled => AnalysisErrorCodes::CANCELLED,
            AnalysisError::AlreadyInProgress { .. } => AnalysisErrorCodes::ALREADY_IN_PROGRESS,
            AnalysisError::Suggestion(_) => AnalysisErrorCodes::SUGGESTION_FAILED,
            AnalysisError::LockPoisoned { .. } => AnalysisErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            AnalysisError::InvalidSampleRate { sample_rate } => {
                format!("Sample rate must be greater than 0 (got {})", sample_rate)
            }
            AnalysisError::InvalidConfig { reason } => {
                format!("Invalid configuration: {}", reason)
            }
            AnalysisError::Cancelled => "Analysis cancelled".to_string(),
            AnalysisError::AlreadyInProgress { track_id } => {
                format!("Analysis already in progress for track {}", track_id)
            }
            AnalysisError::Suggestion(err) => format!("Suggestion service failed: {}", err),
            AnalysisError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AnalysisError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Suggestion(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SuggestionError> for AnalysisError {
    fn from(err: SuggestionError) -> Self {
        match err {
            SuggestionError::Cancelled => AnalysisError::Cancelled,
            other => AnalysisError::Suggestion(other),
        }
    }
}

// Error types for the emotion feature pipeline
//
// This module defines structured error types for analysis, caching,
// personalization and the remote suggestion port. Each family carries
// numeric codes so hosts can map failures to user-facing messages.

mod analysis;
mod cache;
mod personalization;
mod suggestion;

pub use analysis::{log_analysis_error, AnalysisError, AnalysisErrorCodes};
pub use cache::{log_cache_error, CacheError, CacheErrorCodes};
pub use personalization::{
    log_personalization_error, PersonalizationError, PersonalizationErrorCodes,
};
pub use suggestion::{log_suggestion_error, SuggestionError, SuggestionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// host integrations.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

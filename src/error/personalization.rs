// Personalization error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Personalization error code constants
///
/// Error code range: 4001-4006
pub struct PersonalizationErrorCodes;

impl PersonalizationErrorCodes {
    /// Not enough correction samples to train
    pub const INSUFFICIENT_SAMPLES: i32 = 4001;

    /// A training sample lies outside the emotion coordinate ranges
    pub const INVALID_SAMPLE: i32 = 4002;

    /// No profile is active
    pub const NO_ACTIVE_PROFILE: i32 = 4003;

    /// Reading or writing profile files failed
    pub const PERSISTENCE: i32 = 4004;

    /// Persisted weights do not match the network architecture
    pub const MODEL_SHAPE: i32 = 4005;

    /// Profile state lock was poisoned
    pub const LOCK_POISONED: i32 = 4006;
}

/// Log a personalization error with structured context
pub fn log_personalization_error(err: &PersonalizationError, context: &str) {
    error!(
        "Personalization error in {}: code={}, component=PersonalizationModel, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Personalization-related errors
///
/// None of these stop suggestions from flowing: callers fall back to
/// passing suggestions through uncorrected.
#[derive(Debug, Clone, PartialEq)]
pub enum PersonalizationError {
    /// Insufficient samples collected for training
    InsufficientSamples { required: usize, collected: usize },

    /// Sample coordinates are outside valence [-1,1] / arousal [0,1]
    InvalidSample { reason: String },

    /// Operation needs an active profile
    NoActiveProfile,

    /// Profile file I/O or encoding failure
    Persistence { details: String },

    /// Weight matrices have the wrong dimensions
    ModelShape { reason: String },

    /// Profile state lock was poisoned
    LockPoisoned,
}

impl ErrorCode for PersonalizationError {
    fn code(&self) -> i32 {
        match self {
            PersonalizationError::InsufficientSamples { .. } => {
                PersonalizationErrorCodes::INSUFFICIENT_SAMPLES
            }
            PersonalizationError::InvalidSample { .. } => PersonalizationErrorCodes::INVALID_SAMPLE,
            PersonalizationError::NoActiveProfile => PersonalizationErrorCodes::NO_ACTIVE_PROFILE,
            PersonalizationError::Persistence { .. } => PersonalizationErrorCodes::PERSISTENCE,
            PersonalizationError::ModelShape { .. } => PersonalizationErrorCodes::MODEL_SHAPE,
            PersonalizationError::LockPoisoned => PersonalizationErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            PersonalizationError::InsufficientSamples {
                required,
                collected,
            } => {
                format!("Insufficient samples: need {}, got {}", required, collected)
            }
            PersonalizationError::InvalidSample { reason } => {
                format!("Invalid training sample: {}", reason)
            }
            PersonalizationError::NoActiveProfile => "No active profile".to_string(),
            PersonalizationError::Persistence { details } => {
                format!("Profile persistence failed: {}", details)
            }
            PersonalizationError::ModelShape { reason } => {
                format!("Model shape mismatch: {}", reason)
            }
            PersonalizationError::LockPoisoned => "Profile state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for PersonalizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PersonalizationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PersonalizationError {}

impl From<std::io::Error> for PersonalizationError {
    fn from(err: std::io::Error) -> Self {
        PersonalizationError::Persistence {
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for PersonalizationError {
    fn from(err: serde_json::Error) -> Self {
        PersonalizationError::Persistence {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_personalization_error_codes() {
        assert_eq!(
            PersonalizationError::InsufficientSamples {
                required: 10,
                collected: 4
            }
            .code(),
            PersonalizationErrorCodes::INSUFFICIENT_SAMPLES
        );
        assert_eq!(PersonalizationError::NoActiveProfile.code(), 4003);
        assert_eq!(PersonalizationError::LockPoisoned.code(), 4006);
    }

    #[test]
    fn test_insufficient_samples_message() {
        let err = PersonalizationError::InsufficientSamples {
            required: 10,
            collected: 4,
        };
        assert_eq!(err.message(), "Insufficient samples: need 10, got 4");
    }
}

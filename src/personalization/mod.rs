// Personalization - per-profile correction of suggested emotion coordinates
//
// Module organization:
// - mod.rs: Coordinate and training-sample types
// - model: Residual tanh regressor (train / predict)
// - store: Per-profile model and sample-log persistence

pub mod model;
pub mod store;

pub use model::{PersonalizationModel, ARCHITECTURE};
pub use store::ProfileStore;

use serde::{Deserialize, Serialize};

use crate::error::PersonalizationError;

/// A (valence, arousal) pair
///
/// Valence lies in [-1, 1], arousal in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionCoordinate {
    pub valence: f32,
    pub arousal: f32,
}

impl EmotionCoordinate {
    pub fn new(valence: f32, arousal: f32) -> Self {
        Self { valence, arousal }
    }

    fn validate(&self, label: &str) -> Result<(), PersonalizationError> {
        let valence_ok = self.valence.is_finite() && (-1.0..=1.0).contains(&self.valence);
        let arousal_ok = self.arousal.is_finite() && (0.0..=1.0).contains(&self.arousal);
        if valence_ok && arousal_ok {
            Ok(())
        } else {
            Err(PersonalizationError::InvalidSample {
                reason: format!(
                    "{} ({}, {}) outside valence [-1,1] / arousal [0,1]",
                    label, self.valence, self.arousal
                ),
            })
        }
    }
}

/// One user correction: what was suggested and what the user set instead
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub input: EmotionCoordinate,
    pub output: EmotionCoordinate,
}

impl TrainingSample {
    pub fn new(input: EmotionCoordinate, output: EmotionCoordinate) -> Self {
        Self { input, output }
    }

    /// Both coordinates must lie inside the emotion ranges
    pub fn validate(&self) -> Result<(), PersonalizationError> {
        self.input.validate("input")?;
        self.output.validate("output")
    }
}

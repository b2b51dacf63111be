//! Remote emotion-suggestion port.
//!
//! The large-model suggestion service is an external collaborator. The
//! pipeline only depends on the [`SuggestionService`] trait, so hosts inject
//! a real client and tests inject stubs.

mod retry;

pub use retry::RetryingSuggestionService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SuggestionError;

/// What crosses the boundary to the remote service.
///
/// The digest is bounded (~100 tuples) regardless of track length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub track_id: String,
    /// Compact time/amplitude/centroid/flux digest
    pub digest: String,
    /// Optional lyrics or annotations for the track
    pub context: Option<String>,
    pub duration_seconds: f64,
}

/// A suggested emotion event returned by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionSuggestion {
    /// Seconds from track start
    pub time: f64,
    /// Positivity, -1.0 to 1.0
    pub valence: f32,
    /// Energy, 0.0 to 1.0
    pub arousal: f32,
    /// 0 to 100
    pub intensity: u8,
    /// 0.0 to 1.0
    pub confidence: f32,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub sync_notes: String,
    #[serde(default)]
    pub imagery: String,
}

impl EmotionSuggestion {
    /// Suggestion with only the coordinate fields set
    pub fn at(time: f64, valence: f32, arousal: f32) -> Self {
        Self {
            time,
            valence,
            arousal,
            intensity: 50,
            confidence: 0.5,
            rationale: String::new(),
            category: String::new(),
            triggers: Vec::new(),
            sync_notes: String::new(),
            imagery: String::new(),
        }
    }

    /// Clamp coordinates and scores into their documented ranges
    pub fn sanitized(mut self) -> Self {
        self.valence = clamp_finite(self.valence, -1.0, 1.0);
        self.arousal = clamp_finite(self.arousal, 0.0, 1.0);
        self.confidence = clamp_finite(self.confidence, 0.0, 1.0);
        self.intensity = self.intensity.min(100);
        self
    }
}

fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        0.0f32.clamp(min, max)
    }
}

/// Trait for remote suggestion providers.
///
/// One outstanding call per analysis request; implementations should not
/// retry internally (wrap in [`RetryingSuggestionService`] instead).
#[async_trait]
pub trait SuggestionService: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Request emotion suggestions for a summarized track
    async fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> Result<Vec<EmotionSuggestion>, SuggestionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_clamps_ranges() {
        let mut suggestion = EmotionSuggestion::at(1.0, 1.7, -0.3);
        suggestion.intensity = 180;
        suggestion.confidence = f32::NAN;

        let clean = suggestion.sanitized();
        assert_eq!(clean.valence, 1.0);
        assert_eq!(clean.arousal, 0.0);
        assert_eq!(clean.intensity, 100);
        assert_eq!(clean.confidence, 0.0);
    }

    #[test]
    fn test_deserialize_minimal_record() {
        let json = r#"{ "time": 12.5, "valence": 0.2, "arousal": 0.7, "intensity": 64, "confidence": 0.8 }"#;
        let suggestion: EmotionSuggestion = serde_json::from_str(json).unwrap();
        assert_eq!(suggestion.intensity, 64);
        assert!(suggestion.triggers.is_empty());
        assert!(suggestion.rationale.is_empty());
    }
}

//! Configuration management for analysis parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! so frame sizes, detector weights, summarizer blends, cache TTL and
//! training budgets can be adjusted without recompilation. Every field
//! has a documented default; missing fields fall back to it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::AnalysisError;

/// Default config file shipped with the crate
pub const DEFAULT_CONFIG_PATH: &str = "assets/analysis_config.json";

/// Lower bound for the summarized waveform point budget
pub const MIN_TARGET_POINTS: usize = 500;

/// Upper bound for the summarized waveform point budget
pub const MAX_TARGET_POINTS: usize = 8000;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub extraction: ExtractionConfig,
    pub onset: OnsetDetectionConfig,
    pub summarizer: SummarizerConfig,
    pub cache: CacheConfig,
    pub personalization: PersonalizationConfig,
    pub suggestion: SuggestionConfig,
}

/// Spectral frame extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// FFT window size in samples
    pub frame_size: usize,
    /// Hop between consecutive frames in samples
    pub hop_size: usize,
    /// Seconds of audio processed between cooperative yields
    pub slice_seconds: f32,
    /// Compute harmonic richness, dissonance, vocal probability and dynamics
    pub extended_descriptors: bool,
    /// Number of spectral peaks that maps to harmonic richness 1.0
    pub harmonic_peak_budget: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            frame_size: 2048,
            hop_size: 512,
            slice_seconds: 10.0,
            extended_descriptors: true,
            harmonic_peak_budget: 24,
        }
    }
}

/// Onset detection and classification parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetDetectionConfig {
    /// Weight of normalized spectral flux in onset strength
    pub flux_weight: f32,
    /// Weight of the RMS delta ratio in onset strength
    pub amplitude_weight: f32,
    /// Minimum strength for an event to be emitted
    pub threshold: f32,
    /// Minimum seconds between emitted events
    pub min_onset_interval: f32,
    /// Trailing window (seconds) for the timing-regularity score
    pub regularity_window: f32,
    /// Strength above which an event is a Section boundary
    pub section_threshold: f32,
    /// Strength above which an event is a Phrase boundary
    pub phrase_threshold: f32,
    /// Strength above which an event is a Beat
    pub beat_threshold: f32,
    /// Floor for the previous RMS in the delta ratio
    pub rms_epsilon: f32,
}

impl Default for OnsetDetectionConfig {
    fn default() -> Self {
        Self {
            flux_weight: 0.6,
            amplitude_weight: 0.4,
            threshold: 0.3,
            min_onset_interval: 0.1,
            regularity_window: 2.0,
            section_threshold: 0.8,
            phrase_threshold: 0.6,
            beat_threshold: 0.4,
            rms_epsilon: 1e-4,
        }
    }
}

/// Feature summarization parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Point budget for the summarized waveform (clamped to 500..=8000)
    pub target_points: usize,
    /// Tuples rendered into the suggestion-service digest
    pub digest_points: usize,
    /// Half-width (seconds) of the neighbourhood used for local scores
    pub context_window: f32,
    /// Onsets closer than this (seconds) amplify emotional intensity
    pub onset_proximity: f32,
    /// Emotional intensity blend: dynamic contrast
    pub intensity_contrast_weight: f32,
    /// Emotional intensity blend: energy flow
    pub intensity_energy_weight: f32,
    /// Emotional intensity blend: dissonance
    pub intensity_dissonance_weight: f32,
    /// Multiplier applied to nearby onset strength
    pub onset_amplification: f32,
    /// Structural change blend: phrase-boundary flag
    pub structure_phrase_weight: f32,
    /// Structural change blend: Section onset presence
    pub structure_section_weight: f32,
    /// Structural change blend: dynamic contrast
    pub structure_contrast_weight: f32,
    /// Musical complexity blend: harmonic richness
    pub complexity_harmonic_weight: f32,
    /// Musical complexity blend: chord complexity
    pub complexity_chord_weight: f32,
    /// Musical complexity blend: rhythmic complexity
    pub complexity_rhythm_weight: f32,
    /// Onsets per second that maps to rhythmic complexity 1.0
    pub rhythm_density_ceiling: f32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            target_points: 1000,
            digest_points: 100,
            context_window: 1.0,
            onset_proximity: 0.5,
            intensity_contrast_weight: 0.4,
            intensity_energy_weight: 0.4,
            intensity_dissonance_weight: 0.2,
            onset_amplification: 0.5,
            structure_phrase_weight: 0.4,
            structure_section_weight: 0.4,
            structure_contrast_weight: 0.2,
            complexity_harmonic_weight: 0.4,
            complexity_chord_weight: 0.3,
            complexity_rhythm_weight: 0.3,
            rhythm_density_ceiling: 8.0,
        }
    }
}

impl SummarizerConfig {
    /// Point budget clamped into the supported display range
    pub fn effective_target_points(&self) -> usize {
        self.target_points.clamp(MIN_TARGET_POINTS, MAX_TARGET_POINTS)
    }
}

/// Analysis cache parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in days
    pub ttl_days: u64,
    /// Points sampled from each of the start/middle/end of a waveform for hashing
    pub hash_sample_points: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_days: 30,
            hash_sample_points: 10,
        }
    }
}

impl CacheConfig {
    /// TTL in milliseconds
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_days.saturating_mul(24 * 60 * 60 * 1000)
    }
}

/// Personalization training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalizationConfig {
    /// Samples required before training is offered
    pub min_samples: usize,
    /// Fixed training epoch budget (no early stopping)
    pub epochs: usize,
    /// Gradient descent step size
    pub learning_rate: f32,
    /// Minibatch size; 0 means full batch
    pub batch_size: usize,
    /// Seed for weight initialization and shuffling
    pub seed: u64,
    /// Max seconds between a marker edit and a suggestion for it to count as a correction
    pub proximity_seconds: f32,
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self {
            min_samples: 10,
            epochs: 50,
            learning_rate: 0.1,
            batch_size: 4,
            seed: 0x5EED,
            proximity_seconds: 2.0,
        }
    }
}

/// Remote suggestion call parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    /// Retries after the first failed attempt (transient failures only)
    pub max_retries: u32,
    /// Back-off before the first retry, doubled on each subsequent one
    pub initial_backoff_ms: u64,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load the bundled default configuration file
    pub fn load() -> Self {
        Self::load_from_file(DEFAULT_CONFIG_PATH)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |reason: &str| {
            Err(AnalysisError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.extraction.frame_size < 2 {
            return invalid("extraction.frame_size must be at least 2");
        }
        if self.extraction.hop_size == 0 {
            return invalid("extraction.hop_size must be greater than 0");
        }
        if !(self.extraction.slice_seconds > 0.0) {
            return invalid("extraction.slice_seconds must be positive");
        }
        if self.onset.min_onset_interval < 0.0 {
            return invalid("onset.min_onset_interval must not be negative");
        }
        if self.summarizer.digest_points == 0 {
            return invalid("summarizer.digest_points must be greater than 0");
        }
        if self.personalization.epochs == 0 {
            return invalid("personalization.epochs must be greater than 0");
        }
        if !(self.personalization.learning_rate > 0.0) {
            return invalid("personalization.learning_rate must be positive");
        }
        Ok(())
    }
}

// OnsetDetector - flux/RMS onset detection and event classification
//
// This module detects musically significant timestamps from the frame
// series produced by the SpectralFrameExtractor.
//
// Algorithm:
// 1. Onset strength per hop: flux_weight × flux + amplitude_weight × ΔRMS ratio
//    where ΔRMS ratio = |RMS_t - RMS_(t-1)| / max(RMS_(t-1), ε), capped at 1
// 2. Emit when strength > threshold and at least min_onset_interval has
//    elapsed since the previous emitted event (debounce)
// 3. Classify by strength: > 0.8 Section, > 0.6 Phrase, > 0.4 Beat, else Onset
// 4. Confidence = mean(strength, timing regularity), where regularity comes
//    from the spread of inter-onset intervals in a trailing 2 s window

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::analysis::features::FrameFeature;
use crate::config::OnsetDetectionConfig;

/// Regularity reported when too few intervals exist to measure spacing
const NEUTRAL_REGULARITY: f32 = 0.5;

/// Classification of a detected event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OnsetType {
    Onset,
    Beat,
    Phrase,
    Section,
}

/// A musically significant timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OnsetEvent {
    /// Seconds from track start
    pub time: f64,
    /// Onset strength (0.0 to 1.0)
    pub strength: f32,
    #[serde(rename = "type")]
    pub onset_type: OnsetType,
    /// Detection confidence (0.0 to 1.0)
    pub confidence: f32,
}

/// OnsetDetector classifies frames into onset/beat/phrase/section events
pub struct OnsetDetector {
    config: OnsetDetectionConfig,
}

impl OnsetDetector {
    /// Create a detector with default parameters
    pub fn new() -> Self {
        Self::with_config(OnsetDetectionConfig::default())
    }

    /// Create a detector with explicit configuration parameters
    pub fn with_config(config: OnsetDetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OnsetDetectionConfig {
        &self.config
    }

    /// Detect events for a whole track
    ///
    /// A track shorter than one analysis frame yields no events.
    ///
    /// # Arguments
    /// * `frames` - Extractor output for the track
    /// * `sample_count` - Length of the source buffer in samples
    /// * `frame_size` - Analysis frame length in samples
    pub fn detect_track(
        &self,
        frames: &[FrameFeature],
        sample_count: usize,
        frame_size: usize,
    ) -> Vec<OnsetEvent> {
        if sample_count < frame_size {
            return Vec::new();
        }
        self.detect(frames)
    }

    /// Detect events from a time-ordered frame series
    ///
    /// # Returns
    /// Events strictly increasing in time, at least `min_onset_interval` apart
    pub fn detect(&self, frames: &[FrameFeature]) -> Vec<OnsetEvent> {
        let mut events = Vec::new();
        let mut recent_times: VecDeque<f64> = VecDeque::new();
        let mut previous_rms = 0.0f32;
        let min_interval = self.config.min_onset_interval.max(0.0) as f64;

        for frame in frames {
            let strength = self.onset_strength(frame.spectral_flux, frame.rms, previous_rms);
            previous_rms = frame.rms;

            if strength <= self.config.threshold {
                continue;
            }

            if let Some(last) = events.last().map(|e: &OnsetEvent| e.time) {
                if frame.time_offset - last < min_interval {
                    continue;
                }
            }

            let regularity = self.timing_regularity(&mut recent_times, frame.time_offset);
            let confidence = ((strength + regularity) / 2.0).clamp(0.0, 1.0);

            events.push(OnsetEvent {
                time: frame.time_offset,
                strength,
                onset_type: self.classify(strength),
                confidence,
            });
        }

        tracing::debug!(
            "[OnsetDetector] {} events from {} frames",
            events.len(),
            frames.len()
        );

        events
    }

    /// Weighted blend of flux and amplitude-delta ratio, clamped to [0, 1]
    pub fn onset_strength(&self, flux: f32, rms: f32, previous_rms: f32) -> f32 {
        let ratio = (rms - previous_rms).abs() / previous_rms.max(self.config.rms_epsilon);
        let strength = self.config.flux_weight * flux.clamp(0.0, 1.0)
            + self.config.amplitude_weight * ratio.min(1.0);

        if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Map strength onto an event type
    pub fn classify(&self, strength: f32) -> OnsetType {
        if strength > self.config.section_threshold {
            OnsetType::Section
        } else if strength > self.config.phrase_threshold {
            OnsetType::Phrase
        } else if strength > self.config.beat_threshold {
            OnsetType::Beat
        } else {
            OnsetType::Onset
        }
    }

    /// Score how evenly spaced the events in the trailing window are
    ///
    /// Pushes `time` into the window, evicts events older than
    /// `regularity_window`, then maps the coefficient of variation of the
    /// remaining inter-onset intervals to (0, 1].
    fn timing_regularity(&self, recent: &mut VecDeque<f64>, time: f64) -> f32 {
        recent.push_back(time);
        let window = self.config.regularity_window.max(0.0) as f64;
        while let Some(&front) = recent.front() {
            if time - front > window {
                recent.pop_front();
            } else {
                break;
            }
        }

        if recent.len() < 3 {
            return NEUTRAL_REGULARITY;
        }

        let intervals: Vec<f64> = recent
            .iter()
            .zip(recent.iter().skip(1))
            .map(|(a, b)| b - a)
            .collect();
        let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
        if mean <= f64::EPSILON {
            return NEUTRAL_REGULARITY;
        }

        let variance =
            intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / intervals.len() as f64;
        let coefficient_of_variation = variance.sqrt() / mean;

        (1.0 / (1.0 + coefficient_of_variation)) as f32
    }
}

impl Default for OnsetDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::SpectralFrameExtractor;
    use crate::config::ExtractionConfig;
    use crate::testing::signals;

    const SAMPLE_RATE: u32 = 44100;

    fn frame(time: f64, flux: f32, rms: f32) -> FrameFeature {
        FrameFeature {
            time_offset: time,
            amplitude: rms,
            rms,
            spectral_centroid: 0.0,
            spectral_flux: flux,
            extended: None,
        }
    }

    fn extract(signal: &[f32]) -> Vec<FrameFeature> {
        SpectralFrameExtractor::new(SAMPLE_RATE, ExtractionConfig::default())
            .unwrap()
            .extract(signal)
    }

    #[test]
    fn test_classification_policy() {
        let detector = OnsetDetector::new();
        assert_eq!(detector.classify(0.95), OnsetType::Section);
        assert_eq!(detector.classify(0.7), OnsetType::Phrase);
        assert_eq!(detector.classify(0.5), OnsetType::Beat);
        assert_eq!(detector.classify(0.35), OnsetType::Onset);
        assert_eq!(detector.classify(0.8), OnsetType::Phrase);
    }

    #[test]
    fn test_strength_weights() {
        let detector = OnsetDetector::new();
        // No level change: only flux contributes
        assert!((detector.onset_strength(1.0, 0.5, 0.5) - 0.6).abs() < 1e-6);
        // Doubling RMS saturates the ratio term
        assert!((detector.onset_strength(0.0, 0.4, 0.2) - 0.4).abs() < 1e-6);
        // Silence stays at zero
        assert_eq!(detector.onset_strength(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_silence_has_no_events() {
        let detector = OnsetDetector::new();
        let frames = extract(&signals::silence(SAMPLE_RATE, 5.0));
        assert!(detector.detect(&frames).is_empty());
    }

    #[test]
    fn test_track_shorter_than_frame_is_empty() {
        let detector = OnsetDetector::new();
        let signal = signals::noise(SAMPLE_RATE, 0.01, 0.8, 1);
        let frames = extract(&signal);
        assert!(!frames.is_empty());
        assert!(detector.detect_track(&frames, signal.len(), 2048).is_empty());
    }

    #[test]
    fn test_detects_bursts() {
        let detector = OnsetDetector::new();
        let signal = signals::impulses(SAMPLE_RATE, 3.0, &[0.5, 1.5, 2.5], 0.9);
        let events = detector.detect(&extract(&signal));

        assert!(events.len() >= 3, "expected >= 3 events, got {:?}", events);
        for target in [0.5, 1.5, 2.5] {
            assert!(
                events.iter().any(|e| (e.time - target).abs() < 0.1),
                "no event near {}s: {:?}",
                target,
                events
            );
        }
    }

    #[test]
    fn test_debounce_enforces_min_interval() {
        let detector = OnsetDetector::new();
        // Every frame alternates between loud and quiet, 10 ms apart
        let frames: Vec<FrameFeature> = (0..300)
            .map(|i| {
                let loud = i % 2 == 0;
                frame(i as f64 * 0.01, if loud { 1.0 } else { 0.0 }, if loud { 0.8 } else { 0.1 })
            })
            .collect();

        let events = detector.detect(&frames);
        assert!(!events.is_empty());
        for pair in events.windows(2) {
            assert!(pair[1].time - pair[0].time >= 0.1 - 1e-9);
            assert!(pair[1].time > pair[0].time);
        }
    }

    #[test]
    fn test_debounce_holds_for_noise() {
        let detector = OnsetDetector::new();
        let events = detector.detect(&extract(&signals::noise(SAMPLE_RATE, 4.0, 0.7, 99)));
        for pair in events.windows(2) {
            assert!(pair[1].time - pair[0].time >= 0.1 - 1e-9);
        }
    }

    #[test]
    fn test_regular_spacing_raises_confidence() {
        let detector = OnsetDetector::new();
        let regular: Vec<FrameFeature> = (0..40)
            .flat_map(|i| {
                let t = i as f64 * 0.25;
                [frame(t, 0.6, 0.5), frame(t + 0.01, 0.0, 0.5)]
            })
            .collect();
        let irregular_times = [0.0, 0.12, 0.5, 0.63, 1.4, 1.52, 1.9, 2.7, 2.82, 3.6];
        let irregular: Vec<FrameFeature> = irregular_times
            .iter()
            .flat_map(|&t| [frame(t, 0.6, 0.5), frame(t + 0.01, 0.0, 0.5)])
            .collect();

        let mean_confidence = |events: &[OnsetEvent]| {
            let tail = &events[3..];
            tail.iter().map(|e| e.confidence).sum::<f32>() / tail.len() as f32
        };

        let regular_events = detector.detect(&regular);
        let irregular_events = detector.detect(&irregular);
        assert!(mean_confidence(&regular_events) > mean_confidence(&irregular_events));
        assert!(regular_events
            .iter()
            .chain(irregular_events.iter())
            .all(|e| (0.0..=1.0).contains(&e.confidence)));
    }
}

// FeatureSummarizer - downsampling, composite scores and prompt digest
//
// Reduces the full frame sequence to a bounded number of display/prompt
// points and derives composite scores from the frames and detected events.
//
// Downsampling is nearest-neighbor decimation: point i takes frame
// floor(i × n / target), with the last point pinned to the final frame so
// the waveform always spans the whole track. Peaks survive; nothing is
// averaged.
//
// Composite scores are computed per point over a ±context_window region of
// the full-resolution frames, then averaged for the track-level scores:
// - emotional intensity: contrast/energy-flow/dissonance blend, amplified by
//   the strongest nearby onset
// - structural change: phrase-boundary flag, Section presence, contrast
// - musical complexity: harmonic richness, chord (centroid spread) and
//   rhythmic (onset density) complexity

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::analysis::features::{ExtendedDescriptors, FrameFeature};
use crate::analysis::onset::{OnsetEvent, OnsetType};
use crate::config::SummarizerConfig;

/// Centroid standard deviation that saturates chord complexity
const CHORD_SPREAD_SCALE: f32 = 4.0;

/// Energy-flow gain applied to the before/after amplitude difference
const ENERGY_FLOW_GAIN: f32 = 2.0;

/// Scalar composite scores, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositeScores {
    pub emotional_intensity: f32,
    pub structural_change: f32,
    pub musical_complexity: f32,
}

impl CompositeScores {
    fn mean_of(scores: impl ExactSizeIterator<Item = CompositeScores>) -> Self {
        let count = scores.len();
        if count == 0 {
            return Self::default();
        }

        let total = scores.fold(Self::default(), |acc, s| Self {
            emotional_intensity: acc.emotional_intensity + s.emotional_intensity,
            structural_change: acc.structural_change + s.structural_change,
            musical_complexity: acc.musical_complexity + s.musical_complexity,
        });

        Self {
            emotional_intensity: total.emotional_intensity / count as f32,
            structural_change: total.structural_change / count as f32,
            musical_complexity: total.musical_complexity / count as f32,
        }
    }
}

/// One downsampled waveform point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryPoint {
    /// Seconds from track start
    pub time: f64,
    pub amplitude: f32,
    pub spectral_centroid: f32,
    pub spectral_flux: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedDescriptors>,
    /// Local composite scores around this point
    pub scores: CompositeScores,
}

/// Downsampled waveform plus track-level composite scores
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummarizedWaveform {
    pub points: Vec<SummaryPoint>,
    /// Track length in seconds
    pub duration_seconds: f64,
    /// Number of full-resolution frames the points were taken from
    pub source_frames: usize,
    /// Mean of the per-point scores
    pub scores: CompositeScores,
}

impl SummarizedWaveform {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Render a compact text digest for the suggestion service
    ///
    /// One header line, then at most `max_points` evenly spread lines of
    /// `t=<seconds>s a=<amplitude> c=<centroid> f=<flux>`.
    pub fn digest(&self, max_points: usize) -> String {
        let mut digest = String::with_capacity(32 * max_points.min(self.points.len()) + 64);
        let _ = writeln!(
            digest,
            "duration={:.2}s points={} intensity={:.3} structure={:.3} complexity={:.3}",
            self.duration_seconds,
            self.points.len(),
            self.scores.emotional_intensity,
            self.scores.structural_change,
            self.scores.musical_complexity
        );

        for index in decimate_indices(self.points.len(), max_points) {
            let point = &self.points[index];
            let _ = writeln!(
                digest,
                "t={:.2}s a={:.3} c={:.3} f={:.3}",
                point.time, point.amplitude, point.spectral_centroid, point.spectral_flux
            );
        }

        digest
    }
}

/// Indices selected by nearest-neighbor decimation of `len` items to `target`
///
/// Returns every index when `len <= target`. Otherwise returns exactly
/// `target` strictly increasing indices, first 0 and last `len - 1`.
pub fn decimate_indices(len: usize, target: usize) -> Vec<usize> {
    if target == 0 || len == 0 {
        return Vec::new();
    }
    if len <= target {
        return (0..len).collect();
    }
    if target == 1 {
        return vec![0];
    }

    let mut indices: Vec<usize> = (0..target).map(|i| i * len / target).collect();
    if let Some(last) = indices.last_mut() {
        *last = len - 1;
    }
    indices
}

/// FeatureSummarizer reduces frames to a bounded waveform with scores
pub struct FeatureSummarizer {
    config: SummarizerConfig,
}

impl FeatureSummarizer {
    pub fn new(config: SummarizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Summarize a track
    ///
    /// # Arguments
    /// * `frames` - Time-ordered extractor output
    /// * `onsets` - Time-ordered detector output for the same frames
    /// * `duration_seconds` - Source length in seconds
    pub fn summarize(
        &self,
        frames: &[FrameFeature],
        onsets: &[OnsetEvent],
        duration_seconds: f64,
    ) -> SummarizedWaveform {
        let target = self.config.effective_target_points();

        let points: Vec<SummaryPoint> = decimate_indices(frames.len(), target)
            .into_iter()
            .map(|index| {
                let frame = &frames[index];
                SummaryPoint {
                    time: frame.time_offset,
                    amplitude: frame.amplitude,
                    spectral_centroid: frame.spectral_centroid,
                    spectral_flux: frame.spectral_flux,
                    extended: frame.extended,
                    scores: self.local_scores(frames, onsets, frame.time_offset),
                }
            })
            .collect();

        let scores = CompositeScores::mean_of(points.iter().map(|p| p.scores));

        tracing::info!(
            "[FeatureSummarizer] {} frames -> {} points (intensity {:.3}, structure {:.3}, complexity {:.3})",
            frames.len(),
            points.len(),
            scores.emotional_intensity,
            scores.structural_change,
            scores.musical_complexity
        );

        SummarizedWaveform {
            points,
            duration_seconds,
            source_frames: frames.len(),
            scores,
        }
    }

    /// Composite scores for the region around `time`
    pub fn local_scores(
        &self,
        frames: &[FrameFeature],
        onsets: &[OnsetEvent],
        time: f64,
    ) -> CompositeScores {
        let cfg = &self.config;
        let window = cfg.context_window.max(0.0) as f64;
        let proximity = cfg.onset_proximity.max(0.0) as f64;

        let region = time_range(frames, |f| f.time_offset, time - window, time + window);
        let region_frames = &frames[region];
        if region_frames.is_empty() {
            return CompositeScores::default();
        }

        let near_onsets = &onsets[time_range(onsets, |o| o.time, time - proximity, time + proximity)];
        let window_onsets = &onsets[time_range(onsets, |o| o.time, time - window, time + window)];

        let contrast = dynamic_contrast(region_frames);
        let energy = energy_flow(region_frames, time);
        let dissonance = mean_extended(region_frames, |e| e.dissonance);
        let harmonic = mean_extended(region_frames, |e| e.harmonic_richness);

        let nearby_strength = near_onsets
            .iter()
            .map(|o| o.strength)
            .fold(0.0f32, f32::max);
        let emotional_intensity = ((cfg.intensity_contrast_weight * contrast
            + cfg.intensity_energy_weight * energy
            + cfg.intensity_dissonance_weight * dissonance)
            * (1.0 + cfg.onset_amplification * nearby_strength))
            .clamp(0.0, 1.0);

        let phrase_flag = flag(
            near_onsets
                .iter()
                .any(|o| matches!(o.onset_type, OnsetType::Phrase | OnsetType::Section)),
        );
        let section_presence = flag(
            window_onsets
                .iter()
                .any(|o| o.onset_type == OnsetType::Section),
        );
        let structural_change = (cfg.structure_phrase_weight * phrase_flag
            + cfg.structure_section_weight * section_presence
            + cfg.structure_contrast_weight * contrast)
            .clamp(0.0, 1.0);

        let chord = (centroid_spread(region_frames) * CHORD_SPREAD_SCALE).clamp(0.0, 1.0);
        let span = (2.0 * window).max(f64::EPSILON);
        let density = (window_onsets.len() as f64 / span) as f32;
        let rhythm = if cfg.rhythm_density_ceiling > 0.0 {
            (density / cfg.rhythm_density_ceiling).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let musical_complexity = (cfg.complexity_harmonic_weight * harmonic
            + cfg.complexity_chord_weight * chord
            + cfg.complexity_rhythm_weight * rhythm)
            .clamp(0.0, 1.0);

        CompositeScores {
            emotional_intensity,
            structural_change,
            musical_complexity,
        }
    }
}

impl Default for FeatureSummarizer {
    fn default() -> Self {
        Self::new(SummarizerConfig::default())
    }
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Index range of items whose time lies in [start, end]
fn time_range<T>(
    items: &[T],
    time_of: impl Fn(&T) -> f64,
    start: f64,
    end: f64,
) -> std::ops::Range<usize> {
    let lo = items.partition_point(|item| time_of(item) < start);
    let hi = items.partition_point(|item| time_of(item) <= end);
    lo..hi.max(lo)
}

fn dynamic_contrast(frames: &[FrameFeature]) -> f32 {
    let (min, max) = frames
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), f| (lo.min(f.amplitude), hi.max(f.amplitude)));
    (max - min).clamp(0.0, 1.0)
}

/// Change in mean amplitude across `time`
fn energy_flow(frames: &[FrameFeature], time: f64) -> f32 {
    let split = frames.partition_point(|f| f.time_offset < time);
    let (before, after) = frames.split_at(split);
    if before.is_empty() || after.is_empty() {
        return 0.0;
    }

    let mean = |slice: &[FrameFeature]| {
        slice.iter().map(|f| f.amplitude).sum::<f32>() / slice.len() as f32
    };
    ((mean(after) - mean(before)).abs() * ENERGY_FLOW_GAIN).clamp(0.0, 1.0)
}

fn mean_extended(frames: &[FrameFeature], pick: impl Fn(&ExtendedDescriptors) -> f32) -> f32 {
    let values: Vec<f32> = frames
        .iter()
        .filter_map(|f| f.extended.as_ref().map(&pick))
        .collect();
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

fn centroid_spread(frames: &[FrameFeature]) -> f32 {
    let n = frames.len() as f32;
    let mean = frames.iter().map(|f| f.spectral_centroid).sum::<f32>() / n;
    let variance = frames
        .iter()
        .map(|f| (f.spectral_centroid - mean).powi(2))
        .sum::<f32>()
        / n;
    variance.sqrt()
}

#[cfg(test)]
#[path = "summarizer_tests.rs"]
mod tests;

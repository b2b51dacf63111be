// SpectralFrameExtractor - chunked per-frame descriptor extraction
//
// This module turns raw mono samples into a time-ordered sequence of
// FrameFeature descriptors. Features are computed from time-domain and
// frequency-domain representations of each hop-spaced frame.
//
// Module organization:
// - types: Data structures (FrameFeature, ExtendedDescriptors)
// - fft: FFT computation with windowing
// - spectral: Frequency-domain features (centroid, flux, flatness, peaks)
// - temporal: Time-domain features (peak amplitude, RMS)
// - mod.rs: Coordinator (SpectralFrameExtractor)
//
// Flux normalization runs in two stages: stage one emits raw flux per
// frame while tracking the running maximum, stage two rescales every
// frame once the whole track has been seen.
//
// Long tracks are processed in bounded time slices. The async entry point
// yields to the runtime between slices and honors a cancellation token at
// every slice boundary.

mod fft;
mod spectral;
mod temporal;
mod types;

pub use types::{ExtendedDescriptors, FrameFeature};

use fft::FftProcessor;
use spectral::SpectralFeatures;
use tokio_util::sync::CancellationToken;
use types::RawFrame;

use crate::config::ExtractionConfig;
use crate::error::AnalysisError;

/// Carried between frames and slices during stage one
struct FluxStage {
    previous_spectrum: Vec<f32>,
    max_flux: f32,
    frames: Vec<RawFrame>,
}

impl FluxStage {
    fn new(bin_count: usize, frame_count: usize) -> Self {
        Self {
            previous_spectrum: vec![0.0; bin_count],
            max_flux: 0.0,
            frames: Vec::with_capacity(frame_count),
        }
    }

    /// Stage two: rescale raw flux by the track-wide maximum
    fn finish(self) -> Vec<FrameFeature> {
        let max_flux = self.max_flux;
        self.frames
            .into_iter()
            .map(|frame| frame.finish(max_flux))
            .collect()
    }
}

/// SpectralFrameExtractor coordinates the per-frame DSP pipeline
///
/// Produces exactly ⌈len / hop⌉ frames for a buffer of `len` samples.
/// Frame `i` starts at sample `i * hop`; windows running past the end of
/// the buffer are zero-padded.
pub struct SpectralFrameExtractor {
    fft_processor: FftProcessor,
    spectral_features: SpectralFeatures,
    sample_rate: u32,
    config: ExtractionConfig,
}

impl SpectralFrameExtractor {
    /// Create a new extractor for the given sample rate
    ///
    /// # Errors
    /// - `InvalidSampleRate` when `sample_rate` is 0
    /// - `InvalidConfig` when frame or hop size is unusable
    pub fn new(sample_rate: u32, config: ExtractionConfig) -> Result<Self, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate { sample_rate });
        }
        if config.frame_size < 2 || config.hop_size == 0 {
            return Err(AnalysisError::InvalidConfig {
                reason: format!(
                    "frame_size {} / hop_size {} unusable",
                    config.frame_size, config.hop_size
                ),
            });
        }

        Ok(Self {
            fft_processor: FftProcessor::new(config.frame_size),
            spectral_features: SpectralFeatures::new(sample_rate, config.frame_size),
            sample_rate,
            config,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Number of frames produced for a buffer of `sample_count` samples
    pub fn frame_count(&self, sample_count: usize) -> usize {
        sample_count.div_ceil(self.config.hop_size)
    }

    /// Frames computed between cooperative yields
    pub fn frames_per_slice(&self) -> usize {
        let slice_samples = (self.config.slice_seconds.max(0.0) * self.sample_rate as f32) as usize;
        slice_samples.div_ceil(self.config.hop_size).max(1)
    }

    /// Extract all frames synchronously
    ///
    /// Deterministic: identical input and configuration always produce
    /// identical output. Prefer [`Self::extract_cancellable`] for long tracks
    /// on a shared runtime.
    pub fn extract(&self, samples: &[f32]) -> Vec<FrameFeature> {
        let total = self.frame_count(samples.len());
        let mut stage = FluxStage::new(self.fft_processor.bin_count(), total);
        for index in 0..total {
            self.process_frame(samples, index, &mut stage);
        }
        stage.finish()
    }

    /// Extract all frames, yielding to the runtime between time slices
    ///
    /// # Errors
    /// `AnalysisError::Cancelled` if the token fires at a slice boundary.
    pub async fn extract_cancellable(
        &self,
        samples: &[f32],
        cancel: &CancellationToken,
    ) -> Result<Vec<FrameFeature>, AnalysisError> {
        let total = self.frame_count(samples.len());
        let per_slice = self.frames_per_slice();
        let mut stage = FluxStage::new(self.fft_processor.bin_count(), total);
        let mut next = 0;
        let mut slices = 0usize;

        while next < total {
            if cancel.is_cancelled() {
                tracing::info!(
                    "[Extractor] Cancelled after {} of {} frames",
                    next,
                    total
                );
                return Err(AnalysisError::Cancelled);
            }

            let end = (next + per_slice).min(total);
            for index in next..end {
                self.process_frame(samples, index, &mut stage);
            }
            next = end;
            slices += 1;

            if next < total {
                tokio::task::yield_now().await;
            }
        }

        tracing::debug!(
            "[Extractor] {} frames in {} slices (max raw flux {:.4})",
            total,
            slices,
            stage.max_flux
        );

        Ok(stage.finish())
    }

    /// Stage one for a single frame
    fn process_frame(&self, samples: &[f32], index: usize, stage: &mut FluxStage) {
        let frame_size = self.config.frame_size;
        let start = index * self.config.hop_size;
        let end = (start + frame_size).min(samples.len());
        let window = &samples[start.min(end)..end];

        let amplitude = temporal::compute_peak(window);
        let rms = temporal::compute_rms(window, frame_size);

        let spectrum = self.fft_processor.compute_magnitude_spectrum(window);
        let spectral_centroid = self.spectral_features.compute_centroid(&spectrum);
        let raw_flux = self
            .spectral_features
            .compute_flux(&spectrum, &stage.previous_spectrum);

        let extended = if self.config.extended_descriptors {
            Some(self.compute_extended(&spectrum, rms))
        } else {
            None
        };

        if raw_flux.is_finite() {
            stage.max_flux = stage.max_flux.max(raw_flux);
        }
        stage.previous_spectrum = spectrum;
        stage.frames.push(RawFrame {
            time_offset: start as f64 / self.sample_rate as f64,
            amplitude,
            rms,
            spectral_centroid,
            raw_flux,
            extended,
        });
    }

    fn compute_extended(&self, spectrum: &[f32], rms: f32) -> ExtendedDescriptors {
        let flatness = self.spectral_features.compute_flatness(spectrum);
        let voice_ratio = self.spectral_features.compute_voice_band_ratio(spectrum);

        ExtendedDescriptors {
            harmonic_richness: self
                .spectral_features
                .compute_harmonic_richness(spectrum, self.config.harmonic_peak_budget),
            dissonance: flatness,
            vocal_probability: (voice_ratio * (1.0 - flatness)).clamp(0.0, 1.0),
            dynamics: rms.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::signals;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SAMPLE_RATE: u32 = 44100;

    fn extractor() -> SpectralFrameExtractor {
        SpectralFrameExtractor::new(SAMPLE_RATE, ExtractionConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_zero_sample_rate() {
        let result = SpectralFrameExtractor::new(0, ExtractionConfig::default());
        assert!(matches!(
            result,
            Err(AnalysisError::InvalidSampleRate { sample_rate: 0 })
        ));
    }

    #[test]
    fn test_frame_count_is_ceiling_of_len_over_hop() {
        let extractor = extractor();
        for len in [0usize, 1, 511, 512, 513, 2048, 10_000] {
            let frames = extractor.extract(&vec![0.1; len]);
            assert_eq!(frames.len(), len.div_ceil(512), "len {}", len);
        }
    }

    #[test]
    fn test_time_offsets_strictly_increase() {
        let extractor = extractor();
        let signal = signals::sine(SAMPLE_RATE, 440.0, 0.5, 2.0);
        let frames = extractor.extract(&signal);
        for pair in frames.windows(2) {
            assert!(pair[1].time_offset > pair[0].time_offset);
        }
        assert_eq!(frames[0].time_offset, 0.0);
    }

    #[test]
    fn test_silence_yields_zero_features() {
        let extractor = extractor();
        let frames = extractor.extract(&signals::silence(SAMPLE_RATE, 3.0));
        assert!(!frames.is_empty());
        for frame in &frames {
            assert_eq!(frame.amplitude, 0.0);
            assert_eq!(frame.spectral_centroid, 0.0);
            assert_eq!(frame.spectral_flux, 0.0);
            assert_eq!(frame.extended, Some(ExtendedDescriptors::default()));
        }
    }

    #[test]
    fn test_amplitude_is_frame_peak() {
        let extractor = extractor();
        let frames = extractor.extract(&signals::sine(SAMPLE_RATE, 220.0, 0.6, 1.0));
        let mid = &frames[frames.len() / 2];
        assert!((mid.amplitude - 0.6).abs() < 0.01, "peak {}", mid.amplitude);
    }

    #[test]
    fn test_brighter_signal_has_higher_centroid() {
        let extractor = extractor();
        let low = extractor.extract(&signals::sine(SAMPLE_RATE, 200.0, 0.5, 0.5));
        let high = extractor.extract(&signals::sine(SAMPLE_RATE, 6000.0, 0.5, 0.5));
        let idx = low.len() / 2;
        assert!(high[idx].spectral_centroid > low[idx].spectral_centroid);
        assert!(high[idx].spectral_centroid <= 1.0);
    }

    #[test]
    fn test_flux_normalized_to_unit_max() {
        let extractor = extractor();
        let signal = signals::impulses(SAMPLE_RATE, 3.0, &[0.5, 1.5, 2.5], 0.9);
        let frames = extractor.extract(&signal);
        let max = frames.iter().map(|f| f.spectral_flux).fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
        assert!(frames.iter().all(|f| (0.0..=1.0).contains(&f.spectral_flux)));
    }

    #[test]
    fn test_infinite_sample_keeps_flux_in_range() {
        let extractor = extractor();
        let mut signal = signals::sine(SAMPLE_RATE, 440.0, 0.5, 2.0);
        signal[SAMPLE_RATE as usize] = f32::INFINITY;
        signal[SAMPLE_RATE as usize + 100] = f32::NAN;

        let frames = extractor.extract(&signal);
        for frame in &frames {
            assert!((0.0..=1.0).contains(&frame.spectral_flux), "flux {}", frame.spectral_flux);
            assert!((0.0..=1.0).contains(&frame.spectral_centroid));
            assert!(frame.amplitude.is_finite());
        }
        let max = frames.iter().map(|f| f.spectral_flux).fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = extractor();
        let signal = signals::noise(SAMPLE_RATE, 1.0, 0.3, 7);
        assert_eq!(extractor.extract(&signal), extractor.extract(&signal));
    }

    #[test]
    fn test_extended_descriptors_can_be_disabled() {
        let config = ExtractionConfig {
            extended_descriptors: false,
            ..ExtractionConfig::default()
        };
        let extractor = SpectralFrameExtractor::new(SAMPLE_RATE, config).unwrap();
        let frames = extractor.extract(&signals::sine(SAMPLE_RATE, 440.0, 0.5, 0.2));
        assert!(frames.iter().all(|f| f.extended.is_none()));
    }

    #[tokio::test]
    async fn test_cancellable_matches_sync_extraction() {
        let config = ExtractionConfig {
            slice_seconds: 0.25,
            ..ExtractionConfig::default()
        };
        let extractor = SpectralFrameExtractor::new(SAMPLE_RATE, config).unwrap();
        let signal = signals::noise(SAMPLE_RATE, 2.0, 0.4, 11);
        let token = CancellationToken::new();

        let sliced = extractor.extract_cancellable(&signal, &token).await.unwrap();
        assert_eq!(sliced, extractor.extract(&signal));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_extraction() {
        let extractor = extractor();
        let token = CancellationToken::new();
        token.cancel();

        let result = extractor
            .extract_cancellable(&signals::silence(SAMPLE_RATE, 1.0), &token)
            .await;
        assert_eq!(result, Err(AnalysisError::Cancelled));
    }

    fn sliced_extractor(slice_seconds: f32) -> SpectralFrameExtractor {
        let config = ExtractionConfig {
            slice_seconds,
            ..ExtractionConfig::default()
        };
        SpectralFrameExtractor::new(SAMPLE_RATE, config).unwrap()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_other_tasks_progress_between_slices() {
        let extractor = sliced_extractor(0.25);
        let signal = signals::noise(SAMPLE_RATE, 4.0, 0.4, 3);
        let slices = extractor
            .frame_count(signal.len())
            .div_ceil(extractor.frames_per_slice());
        assert!(slices >= 16);

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                }
            })
        };

        let frames = extractor
            .extract_cancellable(&signal, &CancellationToken::new())
            .await
            .unwrap();
        let observed = ticks.load(Ordering::SeqCst);
        ticker.abort();

        assert_eq!(frames.len(), extractor.frame_count(signal.len()));
        assert!(observed >= slices / 2, "{} ticks over {} slices", observed, slices);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_cancel_between_slices_stops_extraction() {
        let extractor = sliced_extractor(0.25);
        let signal = signals::noise(SAMPLE_RATE, 4.0, 0.4, 5);
        let token = CancellationToken::new();

        // Runs only once the extractor yields after its first slice
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move { token.cancel() })
        };

        let result = extractor.extract_cancellable(&signal, &token).await;
        assert!(canceller.await.is_ok());
        assert_eq!(result, Err(AnalysisError::Cancelled));
    }

    #[tokio::test]
    async fn test_empty_buffer_needs_no_slices() {
        let extractor = extractor();
        let token = CancellationToken::new();
        token.cancel();
        let frames = extractor.extract_cancellable(&[], &token).await.unwrap();
        assert!(frames.is_empty());
    }
}

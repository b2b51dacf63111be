// Spectral module - Frequency-domain feature extraction
//
// This module computes spectral features from magnitude spectra.
// All features are based on the magnitude spectrum (absolute values of FFT bins).
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Lerch, A. (2012). An Introduction to Audio Content Analysis

/// Lower edge of the voice band in Hz
const VOICE_BAND_LOW_HZ: f32 = 300.0;

/// Upper edge of the voice band in Hz
const VOICE_BAND_HIGH_HZ: f32 = 3400.0;

/// Peaks below this fraction of the strongest bin are ignored
const PEAK_FLOOR_RATIO: f32 = 0.1;

/// Magnitude sums below this are treated as silence
const SILENCE_EPSILON: f32 = 1e-10;

/// Spectral feature computation functions
pub struct SpectralFeatures {
    sample_rate: u32,
    fft_size: usize,
}

impl SpectralFeatures {
    /// Create a new spectral features processor
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `fft_size` - FFT window size
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            sample_rate,
            fft_size,
        }
    }

    fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Compute spectral centroid normalized by the Nyquist frequency
    ///
    /// Formula: centroid = Σ(f_i × |X[i]|) / Σ|X[i]| / (sample_rate / 2)
    ///
    /// # Returns
    /// Normalized brightness in [0, 1]; 0 for silent frames
    pub fn compute_centroid(&self, spectrum: &[f32]) -> f32 {
        let bin_width = self.bin_width();

        let weighted_sum: f32 = spectrum
            .iter()
            .enumerate()
            .map(|(i, &mag)| i as f32 * bin_width * mag)
            .sum();

        let magnitude_sum: f32 = spectrum.iter().sum();

        let centroid = weighted_sum / magnitude_sum / self.nyquist();
        if magnitude_sum > SILENCE_EPSILON && centroid.is_finite() {
            centroid.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Compute rectified spectral flux against the previous frame
    ///
    /// Formula: flux = sqrt(Σ max(0, |X_t[i]| - |X_(t-1)[i]|)²)
    ///
    /// Only energy increases contribute, so decays into silence yield 0.
    /// The result is in raw spectral units; normalization happens once the
    /// track-wide maximum is known.
    pub fn compute_flux(&self, spectrum: &[f32], previous: &[f32]) -> f32 {
        spectrum
            .iter()
            .zip(previous.iter())
            .map(|(curr, prev)| {
                let rise = (curr - prev).max(0.0);
                rise * rise
            })
            .sum::<f32>()
            .sqrt()
    }

    /// Compute spectral flatness (tonality measure)
    ///
    /// Formula: flatness = geometric_mean(|X[i]|) / arithmetic_mean(|X[i]|)
    ///
    /// Returns value between 0 (tonal, e.g., sine wave) and 1 (noise-like).
    pub fn compute_flatness(&self, spectrum: &[f32]) -> f32 {
        let non_zero: Vec<f32> = spectrum
            .iter()
            .filter(|&&mag| mag > SILENCE_EPSILON)
            .copied()
            .collect();

        if non_zero.is_empty() {
            return 0.0;
        }

        let log_sum: f32 = non_zero.iter().map(|&mag| mag.ln()).sum();
        let geometric_mean = (log_sum / non_zero.len() as f32).exp();
        let arithmetic_mean: f32 = non_zero.iter().sum::<f32>() / non_zero.len() as f32;

        if arithmetic_mean > SILENCE_EPSILON {
            (geometric_mean / arithmetic_mean).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Count prominent local maxima and map the count onto [0, 1]
    ///
    /// # Arguments
    /// * `spectrum` - Magnitude spectrum
    /// * `peak_budget` - Peak count that saturates the score
    pub fn compute_harmonic_richness(&self, spectrum: &[f32], peak_budget: usize) -> f32 {
        if spectrum.len() < 3 || peak_budget == 0 {
            return 0.0;
        }

        let strongest = spectrum.iter().copied().fold(0.0f32, f32::max);
        if strongest <= SILENCE_EPSILON {
            return 0.0;
        }

        let floor = strongest * PEAK_FLOOR_RATIO;
        let peaks = spectrum
            .windows(3)
            .filter(|w| w[1] > w[0] && w[1] >= w[2] && w[1] >= floor)
            .count();

        (peaks as f32 / peak_budget as f32).min(1.0)
    }

    /// Fraction of spectral energy inside the 300-3400 Hz voice band
    pub fn compute_voice_band_ratio(&self, spectrum: &[f32]) -> f32 {
        let bin_width = self.bin_width();
        let mut band_energy = 0.0f32;
        let mut total_energy = 0.0f32;

        for (i, &mag) in spectrum.iter().enumerate() {
            let energy = mag * mag;
            let freq = i as f32 * bin_width;
            total_energy += energy;
            if (VOICE_BAND_LOW_HZ..=VOICE_BAND_HIGH_HZ).contains(&freq) {
                band_energy += energy;
            }
        }

        if total_energy > SILENCE_EPSILON {
            (band_energy / total_energy).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centroid_of_silence_is_zero() {
        let spectral = SpectralFeatures::new(44100, 2048);
        assert_eq!(spectral.compute_centroid(&vec![0.0; 1025]), 0.0);
    }

    #[test]
    fn test_centroid_is_normalized() {
        let spectral = SpectralFeatures::new(44100, 2048);
        let mut spectrum = vec![0.0; 1025];
        spectrum[1024] = 1.0;
        let centroid = spectral.compute_centroid(&spectrum);
        assert!((centroid - 1.0).abs() < 1e-4, "centroid {}", centroid);

        let mut spectrum = vec![0.0; 1025];
        spectrum[512] = 1.0;
        let centroid = spectral.compute_centroid(&spectrum);
        assert!((centroid - 0.5).abs() < 1e-3, "centroid {}", centroid);
    }

    #[test]
    fn test_flux_ignores_decreases() {
        let spectral = SpectralFeatures::new(44100, 2048);
        let previous = vec![2.0; 16];
        let current = vec![1.0; 16];
        assert_eq!(spectral.compute_flux(&current, &previous), 0.0);
    }

    #[test]
    fn test_flux_is_l2_of_rises() {
        let spectral = SpectralFeatures::new(44100, 2048);
        let previous = vec![0.0; 4];
        let current = vec![3.0, 4.0, 0.0, 0.0];
        assert!((spectral.compute_flux(&current, &previous) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_harmonic_richness_counts_peaks() {
        let spectral = SpectralFeatures::new(44100, 2048);
        let mut spectrum = vec![0.0; 64];
        for bin in [5, 15, 25, 35] {
            spectrum[bin] = 1.0;
        }
        let richness = spectral.compute_harmonic_richness(&spectrum, 8);
        assert!((richness - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_voice_band_ratio() {
        let spectral = SpectralFeatures::new(44100, 2048);
        let bin_width = 44100.0 / 2048.0;
        let mut spectrum = vec![0.0; 1025];
        spectrum[(1000.0 / bin_width) as usize] = 1.0;
        assert!((spectral.compute_voice_band_ratio(&spectrum) - 1.0).abs() < 1e-6);

        let mut spectrum = vec![0.0; 1025];
        spectrum[(8000.0 / bin_width) as usize] = 1.0;
        assert_eq!(spectral.compute_voice_band_ratio(&spectrum), 0.0);
    }
}

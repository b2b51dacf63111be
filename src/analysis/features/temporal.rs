// Temporal module - Time-domain feature extraction
//
// This module computes level features directly from time-domain frames:
// the peak amplitude used for display and the RMS level used by the
// onset detector's amplitude-delta ratio.

/// Peak absolute sample value, clamped to [0, 1]
pub fn compute_peak(audio: &[f32]) -> f32 {
    audio
        .iter()
        .map(|s| s.abs())
        .filter(|s| s.is_finite())
        .fold(0.0f32, f32::max)
        .min(1.0)
}

/// Root-mean-square level over a zero-padded frame
///
/// # Arguments
/// * `audio` - Samples actually present in the frame
/// * `frame_size` - Nominal frame length; missing samples count as zeros
pub fn compute_rms(audio: &[f32], frame_size: usize) -> f32 {
    let len = frame_size.max(audio.len());
    if len == 0 {
        return 0.0;
    }

    let sum_squares: f32 = audio
        .iter()
        .filter(|s| s.is_finite())
        .map(|s| s * s)
        .sum();
    (sum_squares / len as f32).sqrt().min(1.0)
}

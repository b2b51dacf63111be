// Types module - Data structures for per-frame audio features
//
// This module defines the descriptors emitted by the spectral frame
// extractor. Frames are produced in strict time order and are immutable
// once emitted.

use serde::{Deserialize, Serialize};

/// Optional descriptors computed alongside the core frame features
///
/// All values are normalized to [0, 1]; silence yields all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedDescriptors {
    /// Density of prominent spectral peaks (harmonic content)
    pub harmonic_richness: f32,

    /// Spectral flatness (0.0 = tonal, 1.0 = noise-like)
    pub dissonance: f32,

    /// Share of tonal energy in the 300-3400 Hz voice band
    pub vocal_probability: f32,

    /// Frame RMS level
    pub dynamics: f32,
}

/// Features extracted from one analysis frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameFeature {
    /// Frame start in seconds from the beginning of the track
    pub time_offset: f64,

    /// Peak absolute sample value in the frame (0.0 to 1.0)
    pub amplitude: f32,

    /// Root-mean-square level of the zero-padded frame
    pub rms: f32,

    /// Spectral centroid normalized by the Nyquist frequency (0.0 to 1.0)
    ///
    /// Proxy for perceived brightness.
    pub spectral_centroid: f32,

    /// Rectified spectral change relative to the previous frame,
    /// normalized by the track-wide maximum (0.0 to 1.0)
    pub spectral_flux: f32,

    /// Extended descriptors, present when enabled in the extraction config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedDescriptors>,
}

/// Stage-one frame output: flux is still in raw spectral units
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawFrame {
    pub time_offset: f64,
    pub amplitude: f32,
    pub rms: f32,
    pub spectral_centroid: f32,
    pub raw_flux: f32,
    pub extended: Option<ExtendedDescriptors>,
}

impl RawFrame {
    /// Rescale flux by the track-wide maximum, producing the final frame
    ///
    /// A non-finite maximum or raw value yields 0 so the result always
    /// stays in [0, 1].
    pub(crate) fn finish(self, max_flux: f32) -> FrameFeature {
        let finite = max_flux.is_finite() && self.raw_flux.is_finite();
        let spectral_flux = if finite && max_flux > 1e-10 {
            (self.raw_flux / max_flux).clamp(0.0, 1.0)
        } else {
            0.0
        };

        FrameFeature {
            time_offset: self.time_offset,
            amplitude: self.amplitude,
            rms: self.rms,
            spectral_centroid: self.spectral_centroid,
            spectral_flux,
            extended: self.extended,
        }
    }
}

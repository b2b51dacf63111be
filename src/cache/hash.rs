// Cache key hashing
//
// Content hash: blake3 over the first/middle/last N points of a summarized
// waveform. Sampling instead of hashing every point keeps lookups cheap and
// accepts a small false-positive risk on near-identical waveforms.
//
// Context hash: order-independent rolling hash over the non-empty lines of
// the optional text context.

use std::collections::BTreeSet;

use crate::analysis::SummarizedWaveform;

/// Context hash used when no text context is attached
pub const NO_CONTEXT: &str = "none";

/// Hash a deterministic sample of the waveform
///
/// Returns a 32-character hex string (128 bits of blake3 output).
///
/// # Arguments
/// * `waveform` - Summarized waveform to fingerprint
/// * `sample_points` - Points taken from each of the start, middle and end
pub fn content_hash(waveform: &SummarizedWaveform, sample_points: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(waveform.points.len() as u64).to_le_bytes());

    for index in sample_indices(waveform.points.len(), sample_points) {
        let point = &waveform.points[index];
        hasher.update(&point.time.to_bits().to_le_bytes());
        hasher.update(&point.amplitude.to_bits().to_le_bytes());
        hasher.update(&point.spectral_centroid.to_bits().to_le_bytes());
        hasher.update(&point.spectral_flux.to_bits().to_le_bytes());
    }

    let hash = hasher.finalize();
    hex::encode(&hash.as_bytes()[..16])
}

/// Indices of the first, middle and last `n` points, ascending, deduplicated
pub fn sample_indices(len: usize, n: usize) -> Vec<usize> {
    let n = n.min(len);
    let middle_start = (len / 2).saturating_sub(n / 2);

    let indices: BTreeSet<usize> = (0..n)
        .chain(middle_start..(middle_start + n).min(len))
        .chain(len - n..len)
        .collect();
    indices.into_iter().collect()
}

/// Order-independent hash of the optional text context
///
/// Each trimmed non-empty line is hashed with a ×31 rolling hash; line
/// hashes are summed, so reordering lines yields the same value.
pub fn context_hash(context: Option<&str>) -> String {
    let Some(text) = context else {
        return NO_CONTEXT.to_string();
    };

    let mut lines = 0usize;
    let total = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .fold(0u32, |acc, line| {
            lines += 1;
            let line_hash = line
                .bytes()
                .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32));
            acc.wrapping_add(line_hash)
        });

    if lines == 0 {
        NO_CONTEXT.to_string()
    } else {
        format!("{:08x}", total)
    }
}

// Hex encoding without another dependency
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        let mut s = String::with_capacity(bytes.len() * 2);
        for &b in bytes {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{CompositeScores, SummaryPoint};

    fn waveform(len: usize) -> SummarizedWaveform {
        SummarizedWaveform {
            points: (0..len)
                .map(|i| SummaryPoint {
                    time: i as f64 * 0.1,
                    amplitude: (i as f32 * 0.37).sin().abs(),
                    spectral_centroid: 0.2,
                    spectral_flux: 0.1,
                    extended: None,
                    scores: CompositeScores::default(),
                })
                .collect(),
            duration_seconds: len as f64 * 0.1,
            source_frames: len,
            scores: CompositeScores::default(),
        }
    }

    #[test]
    fn test_sample_indices() {
        assert_eq!(sample_indices(100, 3), vec![0, 1, 2, 49, 50, 51, 97, 98, 99]);
        assert_eq!(sample_indices(4, 10), vec![0, 1, 2, 3]);
        assert!(sample_indices(0, 10).is_empty());
    }

    #[test]
    fn test_content_hash_shape_and_determinism() {
        let hash = content_hash(&waveform(500), 10);
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, content_hash(&waveform(500), 10));
    }

    #[test]
    fn test_content_hash_sensitivity() {
        let base = waveform(500);
        let reference = content_hash(&base, 10);

        let mut sampled = base.clone();
        sampled.points[250].amplitude += 0.01;
        assert_ne!(content_hash(&sampled, 10), reference);

        // Points outside the sampled regions do not participate
        let mut unsampled = base.clone();
        unsampled.points[100].amplitude += 0.01;
        assert_eq!(content_hash(&unsampled, 10), reference);
    }

    #[test]
    fn test_context_hash_order_independent() {
        let a = context_hash(Some("first line\nsecond line\n"));
        let b = context_hash(Some("  second line\n\nfirst line"));
        assert_eq!(a, b);
        assert_ne!(a, context_hash(Some("first line\nthird line")));
    }

    #[test]
    fn test_context_hash_absent() {
        assert_eq!(context_hash(None), NO_CONTEXT);
        assert_eq!(context_hash(Some("  \n\n")), NO_CONTEXT);
        assert_ne!(context_hash(Some("x")), NO_CONTEXT);
    }
}

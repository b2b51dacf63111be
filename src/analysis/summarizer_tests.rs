use super::*;
use crate::analysis::features::SpectralFrameExtractor;
use crate::analysis::onset::OnsetDetector;
use crate::config::ExtractionConfig;
use crate::testing::signals;

const SAMPLE_RATE: u32 = 44100;

fn summarizer_with_target(target_points: usize) -> FeatureSummarizer {
    FeatureSummarizer::new(SummarizerConfig {
        target_points,
        ..SummarizerConfig::default()
    })
}

fn frame(time: f64, amplitude: f32, centroid: f32) -> FrameFeature {
    FrameFeature {
        time_offset: time,
        amplitude,
        rms: amplitude,
        spectral_centroid: centroid,
        spectral_flux: 0.0,
        extended: None,
    }
}

fn analyze(signal: &[f32], target_points: usize) -> SummarizedWaveform {
    let extractor = SpectralFrameExtractor::new(SAMPLE_RATE, ExtractionConfig::default()).unwrap();
    let frames = extractor.extract(signal);
    let onsets = OnsetDetector::new().detect(&frames);
    summarizer_with_target(target_points).summarize(
        &frames,
        &onsets,
        signal.len() as f64 / SAMPLE_RATE as f64,
    )
}

#[test]
fn test_decimate_indices_exact_count() {
    let indices = decimate_indices(2584, 500);
    assert_eq!(indices.len(), 500);
    assert_eq!(indices[0], 0);
    assert_eq!(*indices.last().unwrap(), 2583);
    assert!(indices.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_decimate_indices_short_input_keeps_everything() {
    assert_eq!(decimate_indices(7, 500), vec![0, 1, 2, 3, 4, 5, 6]);
    assert!(decimate_indices(0, 500).is_empty());
    assert!(decimate_indices(10, 0).is_empty());
    assert_eq!(decimate_indices(10, 1), vec![0]);
}

#[test]
fn test_decimation_keeps_peaks_unaveraged() {
    let frames: Vec<FrameFeature> = (0..2000)
        .map(|i| frame(i as f64 * 0.01, if i % 4 == 0 { 1.0 } else { 0.0 }, 0.0))
        .collect();
    let waveform = summarizer_with_target(500).summarize(&frames, &[], 20.0);

    // Stride 4 lands on every peak frame
    assert_eq!(waveform.len(), 500);
    assert!(waveform.points.iter().all(|p| p.amplitude == 1.0 || p.amplitude == 0.0));
}

#[test]
fn test_silent_track_scores_zero() {
    let signal = signals::silence(SAMPLE_RATE, 30.0);
    let waveform = analyze(&signal, 500);

    assert_eq!(waveform.len(), 500);
    assert_eq!(waveform.scores, CompositeScores::default());
    assert!(waveform
        .points
        .iter()
        .all(|p| p.amplitude == 0.0 && p.scores == CompositeScores::default()));
}

#[test]
fn test_waveform_spans_track() {
    let signal = signals::sine(SAMPLE_RATE, 440.0, 0.5, 12.0);
    let waveform = analyze(&signal, 500);

    assert_eq!(waveform.points[0].time, 0.0);
    let last = waveform.points.last().unwrap().time;
    assert!(last > 11.9 && last <= 12.0, "last point at {}", last);
    assert!(waveform.points.windows(2).all(|w| w[0].time < w[1].time));
}

#[test]
fn test_target_points_are_clamped() {
    let frames: Vec<FrameFeature> = (0..20_000).map(|i| frame(i as f64 * 0.01, 0.1, 0.1)).collect();
    assert_eq!(summarizer_with_target(10).summarize(&frames, &[], 200.0).len(), 500);
    assert_eq!(summarizer_with_target(50_000).summarize(&frames, &[], 200.0).len(), 8000);
}

#[test]
fn test_summarization_is_deterministic() {
    let signal = signals::noise(SAMPLE_RATE, 6.0, 0.5, 11);
    assert_eq!(analyze(&signal, 500), analyze(&signal, 500));
}

#[test]
fn test_onsets_amplify_intensity() {
    let frames: Vec<FrameFeature> = (0..400)
        .map(|i| frame(i as f64 * 0.01, if i < 200 { 0.1 } else { 0.6 }, 0.2))
        .collect();
    let summarizer = FeatureSummarizer::default();

    let quiet = summarizer.local_scores(&frames, &[], 2.0);
    let accented = summarizer.local_scores(
        &frames,
        &[OnsetEvent {
            time: 2.0,
            strength: 0.9,
            onset_type: OnsetType::Section,
            confidence: 0.8,
        }],
        2.0,
    );

    assert!(quiet.emotional_intensity > 0.0);
    assert!(accented.emotional_intensity > quiet.emotional_intensity);
    assert!(accented.structural_change > quiet.structural_change);
    assert!(accented.musical_complexity > quiet.musical_complexity);
}

#[test]
fn test_scores_stay_in_range() {
    let signal = signals::click_track(SAMPLE_RATE, 8.0, 0.25, 1.0);
    let waveform = analyze(&signal, 500);

    for point in &waveform.points {
        for value in [
            point.scores.emotional_intensity,
            point.scores.structural_change,
            point.scores.musical_complexity,
        ] {
            assert!((0.0..=1.0).contains(&value));
        }
    }
    assert!(waveform.scores.emotional_intensity > 0.0);
}

#[test]
fn test_digest_is_bounded() {
    let signal = signals::sine(SAMPLE_RATE, 220.0, 0.4, 20.0);
    let waveform = analyze(&signal, 1000);
    let digest = waveform.digest(100);

    let lines: Vec<&str> = digest.lines().collect();
    assert_eq!(lines.len(), 101);
    assert!(lines[0].starts_with("duration=20.00s"));
    assert!(lines[1].starts_with("t=0.00s a="));
    assert!(lines.iter().skip(1).all(|l| l.contains(" c=") && l.contains(" f=")));
}

#[test]
fn test_empty_frames_summarize_to_empty_waveform() {
    let waveform = FeatureSummarizer::default().summarize(&[], &[], 0.0);
    assert!(waveform.is_empty());
    assert_eq!(waveform.scores, CompositeScores::default());
    assert_eq!(waveform.digest(100).lines().count(), 1);
}

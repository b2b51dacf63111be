//! End-to-end analysis scenarios: samples in, waveform/onsets/suggestions out.

use std::sync::Arc;

use emotion_features::cache::{AnalysisCache, JsonFileCacheStore, ManualClock};
use emotion_features::config::AppConfig;
use emotion_features::managers::PersonalizationManager;
use emotion_features::personalization::{EmotionCoordinate, ProfileStore};
use emotion_features::testing::{signals, StaticSuggestionService};
use emotion_features::{
    AnalysisPipeline, AnalysisRequest, CompositeScores, EmotionSuggestion,
};
use tokio_util::sync::CancellationToken;

const SAMPLE_RATE: u32 = 44100;

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.summarizer.target_points = 500;
    config
}

#[tokio::test]
async fn silent_track_yields_flat_summary() {
    let service = Arc::new(StaticSuggestionService::new(Vec::new()));
    let pipeline = AnalysisPipeline::new(
        config(),
        AnalysisCache::in_memory(config().cache),
        service.clone(),
    )
    .unwrap();

    let request = AnalysisRequest::new("silence", signals::silence(SAMPLE_RATE, 30.0), SAMPLE_RATE);
    let outcome = pipeline
        .analyze(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.waveform.len(), 500);
    assert_eq!(outcome.waveform.scores, CompositeScores::default());
    assert!(outcome.onsets.is_empty());
    assert!(outcome
        .waveform
        .points
        .iter()
        .all(|p| p.amplitude == 0.0 && p.spectral_centroid == 0.0 && p.spectral_flux == 0.0));

    let first = outcome.waveform.points.first().unwrap().time;
    let last = outcome.waveform.points.last().unwrap().time;
    assert_eq!(first, 0.0);
    assert!(last > 29.9);
}

#[tokio::test]
async fn click_track_produces_onsets_and_scores() {
    let pipeline = AnalysisPipeline::new(
        config(),
        AnalysisCache::in_memory(config().cache),
        Arc::new(StaticSuggestionService::new(Vec::new())),
    )
    .unwrap();

    let request = AnalysisRequest::new(
        "clicks",
        signals::click_track(SAMPLE_RATE, 10.0, 0.5, 0.9),
        SAMPLE_RATE,
    );
    let outcome = pipeline
        .analyze(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.onsets.len() >= 15, "{} onsets", outcome.onsets.len());
    for pair in outcome.onsets.windows(2) {
        assert!(pair[1].time - pair[0].time >= 0.1 - 1e-9);
    }
    assert!(outcome.waveform.scores.emotional_intensity > 0.0);
    assert!(outcome.waveform.scores.musical_complexity > 0.0);
}

#[tokio::test]
async fn cached_analysis_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let samples = signals::sine(SAMPLE_RATE, 440.0, 0.5, 8.0);
    let suggestions = vec![EmotionSuggestion::at(2.0, 0.5, 0.7)];

    let first_service = Arc::new(StaticSuggestionService::new(suggestions.clone()));
    {
        let cache = AnalysisCache::open(
            Arc::new(JsonFileCacheStore::new(&cache_path)),
            clock.clone(),
            config().cache,
        );
        let pipeline = AnalysisPipeline::new(config(), cache, first_service.clone()).unwrap();
        let outcome = pipeline
            .analyze(
                &AnalysisRequest::new("song", samples.clone(), SAMPLE_RATE),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!outcome.from_cache);
    }

    let second_service = Arc::new(StaticSuggestionService::new(Vec::new()));
    let cache = AnalysisCache::open(
        Arc::new(JsonFileCacheStore::new(&cache_path)),
        clock,
        config().cache,
    );
    let pipeline = AnalysisPipeline::new(config(), cache, second_service.clone()).unwrap();
    let outcome = pipeline
        .analyze(
            &AnalysisRequest::new("song", samples, SAMPLE_RATE),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(outcome.from_cache);
    assert_eq!(outcome.raw_suggestions.len(), 1);
    assert_eq!(first_service.calls(), 1);
    assert_eq!(second_service.calls(), 0);
}

#[tokio::test]
async fn personalization_corrects_suggestions() {
    let dir = tempfile::tempdir().unwrap();
    let manager = Arc::new(PersonalizationManager::new(
        ProfileStore::new(dir.path()),
        config().personalization,
    ));
    manager.switch_profile("listener").unwrap();
    for i in 0..10 {
        let valence = i as f32 / 10.0 - 0.5;
        let arousal = 0.1 + 0.07 * i as f32;
        manager
            .record_correction(
                EmotionCoordinate::new(valence, arousal),
                EmotionCoordinate::new(valence, (arousal + 0.2).min(1.0)),
            )
            .unwrap();
    }
    manager.retrain().unwrap();

    let service = Arc::new(StaticSuggestionService::new(vec![
        EmotionSuggestion::at(1.0, 0.1, 0.3),
        EmotionSuggestion::at(3.0, -0.2, 0.45),
    ]));
    let pipeline = AnalysisPipeline::new(config(), AnalysisCache::in_memory(config().cache), service)
        .unwrap()
        .with_personalization(manager);

    let outcome = pipeline
        .analyze(
            &AnalysisRequest::new("song", signals::sine(SAMPLE_RATE, 220.0, 0.4, 4.0), SAMPLE_RATE),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    for (corrected, raw) in outcome.suggestions.iter().zip(&outcome.raw_suggestions) {
        assert_eq!(corrected.time, raw.time);
        assert!(corrected.arousal > raw.arousal + 0.05);
        assert!((0.0..=1.0).contains(&corrected.arousal));
        assert!((-1.0..=1.0).contains(&corrected.valence));
    }
}

#[tokio::test]
async fn infinite_sample_does_not_poison_persisted_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let open_cache = || {
        AnalysisCache::open(
            Arc::new(JsonFileCacheStore::new(&cache_path)),
            clock.clone(),
            config().cache,
        )
    };

    let good = signals::sine(SAMPLE_RATE, 440.0, 0.5, 3.0);
    let mut bad = signals::sine(SAMPLE_RATE, 330.0, 0.5, 3.0);
    bad[SAMPLE_RATE as usize] = f32::INFINITY;

    let pipeline = AnalysisPipeline::new(
        config(),
        open_cache(),
        Arc::new(StaticSuggestionService::new(vec![EmotionSuggestion::at(1.0, 0.1, 0.5)])),
    )
    .unwrap();
    for (track_id, samples) in [("good", good), ("bad", bad)] {
        let outcome = pipeline
            .analyze(
                &AnalysisRequest::new(track_id, samples, SAMPLE_RATE),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(outcome
            .waveform
            .points
            .iter()
            .all(|p| (0.0..=1.0).contains(&p.spectral_flux)));
    }
    drop(pipeline);

    let reopened = open_cache();
    assert_eq!(reopened.len(), 2);
    assert!(reopened.get("good").unwrap().complete);
    assert!(reopened.get("bad").unwrap().complete);
}

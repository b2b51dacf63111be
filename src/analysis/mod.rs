// Analysis module - feature pipeline from raw samples to suggestions
//
// This module orchestrates the complete analysis of one track, from decoded
// mono samples to (optionally personalized) emotion suggestions.
//
// Architecture:
// - SpectralFrameExtractor: per-frame descriptors, sliced with cooperative yields
// - OnsetDetector: onset/beat/phrase/section events from the frame series
// - FeatureSummarizer: bounded waveform, composite scores, prompt digest
// - AnalysisCache: content-addressed gate in front of the remote call
// - SuggestionService: remote port, wrapped in bounded retry
// - PersonalizationManager: optional per-profile correction
//
// Suspension points are the extraction slice boundaries and the remote
// call. The cancellation token is honored at each of them; a cancelled
// analysis leaves the cache untouched. The cache lock is never held across
// an await.

pub mod features;
pub mod onset;
pub mod summarizer;

pub use features::{ExtendedDescriptors, FrameFeature, SpectralFrameExtractor};
pub use onset::{OnsetDetector, OnsetEvent, OnsetType};
pub use summarizer::{
    decimate_indices, CompositeScores, FeatureSummarizer, SummarizedWaveform, SummaryPoint,
};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

use crate::cache::AnalysisCache;
use crate::config::AppConfig;
use crate::error::{log_analysis_error, AnalysisError, SuggestionError};
use crate::managers::PersonalizationManager;
use crate::suggestion::{
    EmotionSuggestion, RetryingSuggestionService, SuggestionRequest, SuggestionService,
};

/// One track to analyze
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub track_id: String,
    /// Decoded mono samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Optional lyrics/annotations forwarded to the suggestion service
    pub context: Option<String>,
}

impl AnalysisRequest {
    pub fn new(track_id: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            track_id: track_id.into(),
            samples,
            sample_rate,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }
}

/// Result of a completed analysis
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub track_id: String,
    pub waveform: SummarizedWaveform,
    pub onsets: Vec<OnsetEvent>,
    /// Suggestions after personalization
    pub suggestions: Vec<EmotionSuggestion>,
    /// Suggestions as returned by the service (or cache)
    pub raw_suggestions: Vec<EmotionSuggestion>,
    /// True when the suggestions came from the cache
    pub from_cache: bool,
}

/// Removes the track from the in-flight set when the analysis ends
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    track_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(&self.track_id);
        }
    }
}

/// Wires extraction, detection, summarization, caching, the suggestion
/// port and personalization into one cancellable analysis call
pub struct AnalysisPipeline {
    config: AppConfig,
    cache: Arc<Mutex<AnalysisCache>>,
    service: Arc<dyn SuggestionService>,
    personalization: Option<Arc<PersonalizationManager>>,
    in_flight: Mutex<HashSet<String>>,
}

impl AnalysisPipeline {
    /// Create a pipeline
    ///
    /// # Errors
    /// `InvalidConfig` when the configuration fails validation
    pub fn new(
        config: AppConfig,
        cache: AnalysisCache,
        service: Arc<dyn SuggestionService>,
    ) -> Result<Self, AnalysisError> {
        config
            .validate()
            .inspect_err(|err| log_analysis_error(err, "AnalysisPipeline::new"))?;

        Ok(Self {
            config,
            cache: Arc::new(Mutex::new(cache)),
            service,
            personalization: None,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// Correct suggestions with the manager's active profile
    pub fn with_personalization(mut self, manager: Arc<PersonalizationManager>) -> Self {
        self.personalization = Some(manager);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared handle to the cache (status queries, sweeps, invalidation)
    pub fn cache(&self) -> Arc<Mutex<AnalysisCache>> {
        Arc::clone(&self.cache)
    }

    /// Analyze one track
    ///
    /// # Errors
    /// - `AlreadyInProgress` when the same track is being analyzed
    /// - `InvalidSampleRate` for a zero sample rate
    /// - `Cancelled` when `cancel` fires at a suspension point
    /// - `Suggestion` when the remote service fails (the waveform is still
    ///   cached as an incomplete entry)
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let _guard = self.begin(&request.track_id)?;

        tracing::info!(
            "[AnalysisPipeline] Analyzing {} ({:.1}s @ {} Hz)",
            request.track_id,
            request.duration_seconds(),
            request.sample_rate
        );

        let extractor =
            SpectralFrameExtractor::new(request.sample_rate, self.config.extraction.clone())?;
        let frames = extractor
            .extract_cancellable(&request.samples, cancel)
            .await?;

        let onsets = OnsetDetector::with_config(self.config.onset.clone()).detect_track(
            &frames,
            request.samples.len(),
            self.config.extraction.frame_size,
        );
        let waveform = FeatureSummarizer::new(self.config.summarizer.clone()).summarize(
            &frames,
            &onsets,
            request.duration_seconds(),
        );
        drop(frames);

        let context = request.context.as_deref();
        let cached = {
            let cache = self.lock_cache()?;
            cache
                .lookup(&request.track_id, &waveform, context)
                .map(|entry| entry.suggestions.clone())
        };

        if let Some(raw_suggestions) = cached {
            tracing::info!("[AnalysisPipeline] Cache hit for {}", request.track_id);
            return Ok(self.finish(request, waveform, onsets, raw_suggestions, true));
        }

        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let suggestion_request = SuggestionRequest {
            track_id: request.track_id.clone(),
            digest: waveform.digest(self.config.summarizer.digest_points),
            context: request.context.clone(),
            duration_seconds: request.duration_seconds(),
        };
        let service = RetryingSuggestionService::new(Arc::clone(&self.service), &self.config.suggestion)
            .with_cancellation(cancel.clone());

        let result = tokio::select! {
            _ = cancel.cancelled() => Err(SuggestionError::Cancelled),
            result = service.suggest(&suggestion_request) => result,
        };

        match result {
            Ok(suggestions) => {
                let raw_suggestions: Vec<EmotionSuggestion> =
                    suggestions.into_iter().map(EmotionSuggestion::sanitized).collect();
                self.lock_cache()?.put(
                    &request.track_id,
                    waveform.clone(),
                    raw_suggestions.clone(),
                    context,
                );
                Ok(self.finish(request, waveform, onsets, raw_suggestions, false))
            }
            Err(SuggestionError::Cancelled) => Err(AnalysisError::Cancelled),
            Err(err) => {
                self.lock_cache()?
                    .put_waveform(&request.track_id, waveform, context);
                let err = AnalysisError::from(err);
                log_analysis_error(&err, "AnalysisPipeline::analyze");
                Err(err)
            }
        }
    }

    /// Whether an analysis of `track_id` is running
    pub fn is_in_flight(&self, track_id: &str) -> bool {
        self.in_flight
            .lock()
            .is_ok_and(|in_flight| in_flight.contains(track_id))
    }

    fn begin(&self, track_id: &str) -> Result<InFlightGuard<'_>, AnalysisError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| AnalysisError::LockPoisoned {
                component: "in_flight".to_string(),
            })?;

        if !in_flight.insert(track_id.to_string()) {
            let err = AnalysisError::AlreadyInProgress {
                track_id: track_id.to_string(),
            };
            log_analysis_error(&err, "AnalysisPipeline::analyze");
            return Err(err);
        }

        Ok(InFlightGuard {
            in_flight: &self.in_flight,
            track_id: track_id.to_string(),
        })
    }

    fn finish(
        &self,
        request: &AnalysisRequest,
        waveform: SummarizedWaveform,
        onsets: Vec<OnsetEvent>,
        raw_suggestions: Vec<EmotionSuggestion>,
        from_cache: bool,
    ) -> AnalysisOutcome {
        let suggestions = match &self.personalization {
            Some(manager) => manager.apply(&raw_suggestions),
            None => raw_suggestions.clone(),
        };

        tracing::info!(
            "[AnalysisPipeline] {} done: {} points, {} onsets, {} suggestions (cache: {})",
            request.track_id,
            waveform.len(),
            onsets.len(),
            suggestions.len(),
            from_cache
        );

        AnalysisOutcome {
            track_id: request.track_id.clone(),
            waveform,
            onsets,
            suggestions,
            raw_suggestions,
            from_cache,
        }
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, AnalysisCache>, AnalysisError> {
        self.cache.lock().map_err(|_| AnalysisError::LockPoisoned {
            component: "AnalysisCache".to_string(),
        })
    }
}

// Emotion Features Core - audio feature extraction and personalization
// Spectral frame extraction, onset detection, summarization, caching and
// per-profile correction of suggested emotion coordinates

// Module declarations
pub mod analysis;
pub mod cache;
pub mod config;
pub mod error;
pub mod managers;
pub mod personalization;
pub mod suggestion;
#[cfg(any(test, feature = "test_fixtures"))]
pub mod testing;

// Re-exports for convenience
pub use analysis::{
    AnalysisOutcome, AnalysisPipeline, AnalysisRequest, CompositeScores, FeatureSummarizer,
    FrameFeature, OnsetDetector, OnsetEvent, OnsetType, SpectralFrameExtractor,
    SummarizedWaveform,
};
pub use cache::{AnalysisCache, CacheEntry, CacheStatus, JsonFileCacheStore};
pub use config::AppConfig;
pub use error::{AnalysisError, CacheError, PersonalizationError, SuggestionError};
pub use managers::PersonalizationManager;
pub use personalization::{EmotionCoordinate, PersonalizationModel, ProfileStore, TrainingSample};
pub use suggestion::{EmotionSuggestion, SuggestionRequest, SuggestionService};

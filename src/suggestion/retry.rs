//! Bounded retry with exponential back-off around a suggestion service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{EmotionSuggestion, SuggestionRequest, SuggestionService};
use crate::config::SuggestionConfig;
use crate::error::{log_suggestion_error, SuggestionError};

/// Retries transient failures (connection, timeout, 429/5xx) with
/// doubling back-off. Permanent failures return immediately.
pub struct RetryingSuggestionService {
    inner: Arc<dyn SuggestionService>,
    max_retries: u32,
    initial_backoff: Duration,
    cancel: CancellationToken,
}

impl RetryingSuggestionService {
    pub fn new(inner: Arc<dyn SuggestionService>, config: &SuggestionConfig) -> Self {
        Self {
            inner,
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            cancel: CancellationToken::new(),
        }
    }

    /// Abandon back-off sleeps when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[async_trait]
impl SuggestionService for RetryingSuggestionService {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> Result<Vec<EmotionSuggestion>, SuggestionError> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(SuggestionError::Cancelled);
            }

            match self.inner.suggest(request).await {
                Ok(suggestions) => return Ok(suggestions),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "[Suggestion] {} attempt {} failed ({}), retrying in {:?}",
                        self.inner.name(),
                        attempt,
                        err,
                        backoff
                    );

                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(SuggestionError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = backoff.saturating_mul(2);
                }
                Err(err) => {
                    log_suggestion_error(&err, "RetryingSuggestionService::suggest");
                    return Err(err);
                }
            }
        }
    }
}

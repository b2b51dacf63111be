//! Stub suggestion services.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SuggestionError;
use crate::suggestion::{EmotionSuggestion, SuggestionRequest, SuggestionService};

/// Always answers with the same suggestions
pub struct StaticSuggestionService {
    suggestions: Vec<EmotionSuggestion>,
    calls: AtomicUsize,
    last_request: Mutex<Option<SuggestionRequest>>,
}

impl StaticSuggestionService {
    pub fn new(suggestions: Vec<EmotionSuggestion>) -> Self {
        Self {
            suggestions,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<SuggestionRequest> {
        self.last_request
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or(None)
    }
}

#[async_trait]
impl SuggestionService for StaticSuggestionService {
    fn name(&self) -> &str {
        "static"
    }

    async fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> Result<Vec<EmotionSuggestion>, SuggestionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        Ok(self.suggestions.clone())
    }
}

/// Always fails with the same error
pub struct FailingSuggestionService {
    error: SuggestionError,
    calls: AtomicUsize,
}

impl FailingSuggestionService {
    pub fn new(error: SuggestionError) -> Self {
        Self {
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SuggestionService for FailingSuggestionService {
    fn name(&self) -> &str {
        "failing"
    }

    async fn suggest(
        &self,
        _request: &SuggestionRequest,
    ) -> Result<Vec<EmotionSuggestion>, SuggestionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Replays a fixed script of responses, then keeps returning the last one
pub struct ScriptedSuggestionService {
    script: Mutex<VecDeque<Result<Vec<EmotionSuggestion>, SuggestionError>>>,
    calls: AtomicUsize,
}

impl ScriptedSuggestionService {
    pub fn new(script: Vec<Result<Vec<EmotionSuggestion>, SuggestionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SuggestionService for ScriptedSuggestionService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn suggest(
        &self,
        _request: &SuggestionRequest,
    ) -> Result<Vec<EmotionSuggestion>, SuggestionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self
            .script
            .lock()
            .map_err(|_| SuggestionError::Connection("script lock poisoned".into()))?;
        match script.len() {
            0 => Ok(Vec::new()),
            1 => script.front().cloned().unwrap_or_else(|| Ok(Vec::new())),
            _ => script.pop_front().unwrap_or_else(|| Ok(Vec::new())),
        }
    }
}

// AnalysisCache - content-addressed store for summarized analyses
//
// An entry is a valid hit only while:
// - its content hash matches a sampled hash of the current waveform
// - its context hash matches the current optional text context
// - it is younger than the TTL (30 days by default)
// - it was written by this cache version and is complete
// - the track is not flagged for re-analysis
//
// Status records outlive their entries so callers can see why a track
// missed; sweep drops a record once it has no entry and has not changed
// for a full TTL.
//
// A miss is never an error. The snapshot is persisted after every
// mutation; persistence failures are logged and ignored, and a corrupt or
// version-mismatched snapshot rehydrates as an empty cache.
//
// The cache is an explicitly constructed value. Callers sharing it across
// tasks wrap it in their own lock.

mod clock;
mod hash;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use hash::{content_hash, context_hash, sample_indices, NO_CONTEXT};
pub use store::{CacheStore, JsonFileCacheStore, MemoryCacheStore};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::SummarizedWaveform;
use crate::config::CacheConfig;
use crate::error::{log_cache_error, CacheError};
use crate::suggestion::EmotionSuggestion;

/// Version tag written into every snapshot and entry
pub const CACHE_VERSION: &str = "emotion-cache-v1";

/// One cached analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub track_id: String,
    pub content_hash: String,
    pub context_hash: String,
    pub waveform: SummarizedWaveform,
    #[serde(default)]
    pub suggestions: Vec<EmotionSuggestion>,
    /// Milliseconds since the Unix epoch
    pub created_at_ms: u64,
    pub version: String,
    /// False when only the waveform was stored (suggestions missing)
    pub complete: bool,
}

/// Per-track bookkeeping kept alongside the entries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheStatus {
    pub has_analysis: bool,
    pub has_waveform: bool,
    pub last_analysis_timestamp: Option<u64>,
    pub needs_reanalysis: bool,
    pub reason: Option<String>,
    /// Milliseconds since the Unix epoch of the last change to this record
    pub updated_at_ms: u64,
}

/// Serialized cache state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version: String,
    #[serde(default)]
    pub entries: BTreeMap<String, CacheEntry>,
    #[serde(default)]
    pub status: BTreeMap<String, CacheStatus>,
}

impl CacheSnapshot {
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
            entries: BTreeMap::new(),
            status: BTreeMap::new(),
        }
    }
}

/// Content-addressed analysis cache
pub struct AnalysisCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    entries: BTreeMap<String, CacheEntry>,
    status: BTreeMap<String, CacheStatus>,
}

impl AnalysisCache {
    /// Open a cache backed by `store`, rehydrating any persisted state
    ///
    /// Never fails: unreadable, corrupt or version-mismatched state is
    /// logged and replaced by an empty cache.
    pub fn open(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        let snapshot = match store.load() {
            Ok(Some(snapshot)) if snapshot.version == CACHE_VERSION => snapshot,
            Ok(Some(snapshot)) => {
                let err = CacheError::VersionMismatch {
                    expected: CACHE_VERSION.to_string(),
                    found: snapshot.version,
                };
                log_cache_error(&err, "AnalysisCache::open");
                CacheSnapshot::empty()
            }
            Ok(None) => CacheSnapshot::empty(),
            Err(err) => {
                log_cache_error(&err, "AnalysisCache::open");
                CacheSnapshot::empty()
            }
        };

        log::info!(
            "[AnalysisCache] Rehydrated {} entries ({} status records)",
            snapshot.entries.len(),
            snapshot.status.len()
        );

        Self {
            store,
            clock,
            config,
            entries: snapshot.entries,
            status: snapshot.status,
        }
    }

    /// Non-persistent cache on the system clock
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::open(Arc::new(MemoryCacheStore::new()), Arc::new(SystemClock), config)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn track_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// True when a complete, fresh entry matches the current inputs
    pub fn has(&self, track_id: &str, waveform: &SummarizedWaveform, context: Option<&str>) -> bool {
        self.lookup(track_id, waveform, context).is_some()
    }

    /// The entry for `track_id` when it is a valid hit for the current inputs
    pub fn lookup(
        &self,
        track_id: &str,
        waveform: &SummarizedWaveform,
        context: Option<&str>,
    ) -> Option<&CacheEntry> {
        let entry = self.get(track_id)?;
        if !entry.complete
            || self.needs_reanalysis(track_id)
            || entry.content_hash != content_hash(waveform, self.config.hash_sample_points)
            || entry.context_hash != context_hash(context)
        {
            return None;
        }
        Some(entry)
    }

    /// Stored entry for `track_id`, unless expired or from another version
    pub fn get(&self, track_id: &str) -> Option<&CacheEntry> {
        self.entries
            .get(track_id)
            .filter(|entry| entry.version == CACHE_VERSION && !self.is_expired(entry))
    }

    /// Store a complete analysis, replacing any prior entry for the track
    pub fn put(
        &mut self,
        track_id: &str,
        waveform: SummarizedWaveform,
        suggestions: Vec<EmotionSuggestion>,
        context: Option<&str>,
    ) {
        self.insert(track_id, waveform, suggestions, context, true);
    }

    /// Store a waveform without suggestions (incomplete entry)
    pub fn put_waveform(
        &mut self,
        track_id: &str,
        waveform: SummarizedWaveform,
        context: Option<&str>,
    ) {
        self.insert(track_id, waveform, Vec::new(), context, false);
    }

    /// Remove the entry for `track_id`; returns whether one existed
    pub fn invalidate(&mut self, track_id: &str) -> bool {
        let removed = self.entries.remove(track_id).is_some();
        if removed {
            let now = self.clock.now_ms();
            let status = self.status.entry(track_id.to_string()).or_default();
            status.updated_at_ms = now;
            status.has_analysis = false;
            status.has_waveform = false;
            status.needs_reanalysis = true;
            status.reason = Some("invalidated".to_string());
        }
        log::info!("[AnalysisCache] Invalidated {} (existed: {})", track_id, removed);
        self.persist("AnalysisCache::invalidate");
        removed
    }

    /// Remove every expired entry; returns how many were removed
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now_ms();
        let ttl = self.config.ttl_ms();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_sub(entry.created_at_ms) >= ttl)
            .map(|(track_id, _)| track_id.clone())
            .collect();

        for track_id in &expired {
            self.entries.remove(track_id);
            let status = self.status.entry(track_id.clone()).or_default();
            status.updated_at_ms = now;
            status.has_analysis = false;
            status.has_waveform = false;
            status.needs_reanalysis = true;
            status.reason = Some("expired".to_string());
        }

        let entries = &self.entries;
        let before = self.status.len();
        self.status.retain(|track_id, status| {
            entries.contains_key(track_id) || now.saturating_sub(status.updated_at_ms) < ttl
        });

        log::info!(
            "[AnalysisCache] Swept {} expired entries, {} remain ({} stale status records dropped)",
            expired.len(),
            self.entries.len(),
            before - self.status.len()
        );
        self.persist("AnalysisCache::sweep");
        expired.len()
    }

    /// Status record for `track_id` (default when unknown)
    pub fn status(&self, track_id: &str) -> CacheStatus {
        self.status.get(track_id).cloned().unwrap_or_default()
    }

    /// Force the next lookup for `track_id` to miss until it is re-put
    pub fn mark_needs_reanalysis(&mut self, track_id: &str, reason: &str) {
        let now = self.clock.now_ms();
        let status = self.status.entry(track_id.to_string()).or_default();
        status.updated_at_ms = now;
        status.needs_reanalysis = true;
        status.reason = Some(reason.to_string());
        self.persist("AnalysisCache::mark_needs_reanalysis");
    }

    /// Current state as a serializable snapshot
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            version: CACHE_VERSION.to_string(),
            entries: self.entries.clone(),
            status: self.status.clone(),
        }
    }

    fn insert(
        &mut self,
        track_id: &str,
        waveform: SummarizedWaveform,
        suggestions: Vec<EmotionSuggestion>,
        context: Option<&str>,
        complete: bool,
    ) {
        let now = self.clock.now_ms();
        let entry = CacheEntry {
            track_id: track_id.to_string(),
            content_hash: content_hash(&waveform, self.config.hash_sample_points),
            context_hash: context_hash(context),
            waveform,
            suggestions,
            created_at_ms: now,
            version: CACHE_VERSION.to_string(),
            complete,
        };

        tracing::debug!(
            "[AnalysisCache] Stored {} (complete: {}, hash {})",
            track_id,
            complete,
            entry.content_hash
        );

        self.entries.insert(track_id.to_string(), entry);
        self.status.insert(
            track_id.to_string(),
            CacheStatus {
                has_analysis: complete,
                has_waveform: true,
                last_analysis_timestamp: Some(now),
                needs_reanalysis: !complete,
                reason: (!complete).then(|| "suggestions missing".to_string()),
                updated_at_ms: now,
            },
        );

        self.persist(if complete {
            "AnalysisCache::put"
        } else {
            "AnalysisCache::put_waveform"
        });
    }

    fn needs_reanalysis(&self, track_id: &str) -> bool {
        self.status
            .get(track_id)
            .is_some_and(|status| status.needs_reanalysis)
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.clock.now_ms().saturating_sub(entry.created_at_ms) >= self.config.ttl_ms()
    }

    fn persist(&self, context: &str) {
        if let Err(err) = self.store.save(&self.snapshot()) {
            log_cache_error(&err, context);
        }
    }
}

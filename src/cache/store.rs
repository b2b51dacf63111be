// Durable stores for the analysis cache snapshot
//
// Layout of the default JSON store:
//   <cache dir>/emotion-features/analysis_cache.json
//
// The whole snapshot is written as one blob. File writes go to a sibling
// temp file first and are renamed into place so a crash mid-write never
// leaves a truncated blob behind.
//
// Decoding is per record: an entry or status record that no longer
// decodes is dropped on its own, the rest of the snapshot survives.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::CacheSnapshot;
use crate::error::CacheError;

/// Persistence backend for the analysis cache
pub trait CacheStore: Send + Sync {
    /// Read the persisted snapshot, `Ok(None)` when nothing was stored yet
    fn load(&self) -> Result<Option<CacheSnapshot>, CacheError>;

    /// Replace the persisted snapshot
    fn save(&self, snapshot: &CacheSnapshot) -> Result<(), CacheError>;
}

/// Snapshot with records still in raw JSON form
#[derive(Deserialize)]
struct RawSnapshot {
    version: String,
    #[serde(default)]
    entries: BTreeMap<String, Value>,
    #[serde(default)]
    status: BTreeMap<String, Value>,
}

fn decode_snapshot(raw: RawSnapshot) -> CacheSnapshot {
    CacheSnapshot {
        version: raw.version,
        entries: decode_records(raw.entries, "entry"),
        status: decode_records(raw.status, "status record"),
    }
}

fn decode_records<T: DeserializeOwned>(
    records: BTreeMap<String, Value>,
    kind: &str,
) -> BTreeMap<String, T> {
    records
        .into_iter()
        .filter_map(|(track_id, value)| match serde_json::from_value(value) {
            Ok(record) => Some((track_id, record)),
            Err(err) => {
                log::warn!(
                    "[AnalysisCache] Dropping undecodable {} for {}: {}",
                    kind,
                    track_id,
                    err
                );
                None
            }
        })
        .collect()
}

/// Single JSON file on disk
pub struct JsonFileCacheStore {
    path: PathBuf,
}

impl JsonFileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform cache directory
    pub fn in_default_location() -> Result<Self, CacheError> {
        Self::default_path().map(Self::new).ok_or_else(|| CacheError::Io {
            details: "no cache directory".to_string(),
        })
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("emotion-features").join("analysis_cache.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl CacheStore for JsonFileCacheStore {
    fn load(&self) -> Result<Option<CacheSnapshot>, CacheError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        Ok(Some(decode_snapshot(serde_json::from_slice(&bytes)?)))
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec(snapshot)?;
        let temp = self.temp_path();
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

/// In-process store holding the serialized blob
///
/// Goes through the same JSON encoding as the file store, so corrupt or
/// mismatched blobs can be exercised without touching the filesystem.
#[derive(Default)]
pub struct MemoryCacheStore {
    blob: Mutex<Option<String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an arbitrary raw blob
    pub fn from_raw(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
        }
    }

    /// Currently stored raw blob
    pub fn raw(&self) -> Option<String> {
        self.blob.lock().ok().and_then(|guard| guard.clone())
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self) -> Result<Option<CacheSnapshot>, CacheError> {
        let guard = self.blob.lock().map_err(|_| CacheError::LockPoisoned)?;
        match guard.as_deref() {
            Some(blob) => Ok(Some(decode_snapshot(serde_json::from_str(blob)?))),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<(), CacheError> {
        let json = serde_json::to_string(snapshot)?;
        let mut guard = self.blob.lock().map_err(|_| CacheError::LockPoisoned)?;
        *guard = Some(json);
        Ok(())
    }
}

// ProfileStore - per-profile model and sample-log files
//
// Layout:
//   <root>/<profile>.model.json     serialized PersonalizationModel
//   <root>/<profile>.samples.json   append-only list of TrainingSample
//
// Each file is independently loadable and overwritable. Writes go through a
// temp file and rename.

use std::fs;
use std::path::{Path, PathBuf};

use super::{PersonalizationModel, TrainingSample};
use crate::error::PersonalizationError;

const MODEL_SUFFIX: &str = ".model.json";
const SAMPLES_SUFFIX: &str = ".samples.json";

/// Directory-backed profile persistence
#[derive(Debug, Clone)]
pub struct ProfileStore {
    root: PathBuf,
}

impl ProfileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the platform data directory
    pub fn in_default_location() -> Result<Self, PersonalizationError> {
        dirs::data_dir()
            .map(|dir| Self::new(dir.join("emotion-features").join("profiles")))
            .ok_or_else(|| PersonalizationError::Persistence {
                details: "no data directory".to_string(),
            })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write (or overwrite) the model for `profile_id`
    pub fn persist(
        &self,
        model: &PersonalizationModel,
        profile_id: &str,
    ) -> Result<(), PersonalizationError> {
        let path = self.model_path(profile_id)?;
        write_atomic(&path, &serde_json::to_vec_pretty(model)?)?;
        log::info!("[ProfileStore] Saved model for profile {}", profile_id);
        Ok(())
    }

    /// Load the model for `profile_id`, `Ok(None)` when none was saved
    ///
    /// # Errors
    /// - `Persistence` when the file is unreadable or not valid JSON
    /// - `ModelShape` when the weights do not match the architecture
    pub fn load(&self, profile_id: &str) -> Result<Option<PersonalizationModel>, PersonalizationError> {
        let path = self.model_path(profile_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let model: PersonalizationModel = serde_json::from_slice(&fs::read(&path)?)?;
        model.validate_shape()?;
        Ok(Some(model))
    }

    /// Replace the sample log for `profile_id`
    pub fn save_samples(
        &self,
        profile_id: &str,
        samples: &[TrainingSample],
    ) -> Result<(), PersonalizationError> {
        let path = self.samples_path(profile_id)?;
        write_atomic(&path, &serde_json::to_vec(samples)?)
    }

    /// Load the sample log for `profile_id` (empty when none was saved)
    pub fn load_samples(&self, profile_id: &str) -> Result<Vec<TrainingSample>, PersonalizationError> {
        let path = self.samples_path(profile_id)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&fs::read(&path)?)?)
    }

    /// Append one sample to the log for `profile_id`
    pub fn append_sample(
        &self,
        profile_id: &str,
        sample: TrainingSample,
    ) -> Result<usize, PersonalizationError> {
        let mut samples = self.load_samples(profile_id)?;
        samples.push(sample);
        self.save_samples(profile_id, &samples)?;
        Ok(samples.len())
    }

    /// Remove every file belonging to `profile_id`
    pub fn delete_profile(&self, profile_id: &str) -> Result<(), PersonalizationError> {
        for path in [self.model_path(profile_id)?, self.samples_path(profile_id)?] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        log::info!("[ProfileStore] Deleted profile {}", profile_id);
        Ok(())
    }

    /// Profile ids that have a model or a sample log on disk
    pub fn profile_ids(&self) -> Result<Vec<String>, PersonalizationError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| {
                name.strip_suffix(MODEL_SUFFIX)
                    .or_else(|| name.strip_suffix(SAMPLES_SUFFIX))
                    .map(str::to_string)
            })
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    /// Profile ids become file names: ASCII alphanumerics, '-' and '_' only
    pub fn is_valid_profile_id(profile_id: &str) -> bool {
        !profile_id.is_empty()
            && profile_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    fn model_path(&self, profile_id: &str) -> Result<PathBuf, PersonalizationError> {
        validate_profile_id(profile_id)?;
        Ok(self.root.join(format!("{}{}", profile_id, MODEL_SUFFIX)))
    }

    fn samples_path(&self, profile_id: &str) -> Result<PathBuf, PersonalizationError> {
        validate_profile_id(profile_id)?;
        Ok(self.root.join(format!("{}{}", profile_id, SAMPLES_SUFFIX)))
    }
}

fn validate_profile_id(profile_id: &str) -> Result<(), PersonalizationError> {
    if ProfileStore::is_valid_profile_id(profile_id) {
        Ok(())
    } else {
        Err(PersonalizationError::Persistence {
            details: format!("invalid profile id {:?}", profile_id),
        })
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersonalizationError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    temp_name.push(".tmp");
    let temp = path.with_file_name(temp_name);
    fs::write(&temp, bytes)?;
    fs::rename(&temp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personalization::EmotionCoordinate;

    fn sample(arousal: f32) -> TrainingSample {
        TrainingSample::new(
            EmotionCoordinate::new(0.1, arousal),
            EmotionCoordinate::new(0.1, (arousal + 0.1).min(1.0)),
        )
    }

    #[test]
    fn test_model_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        let model = PersonalizationModel::new(42);

        assert!(store.load("alice").unwrap().is_none());
        store.persist(&model, "alice").unwrap();
        assert_eq!(store.load("alice").unwrap(), Some(model));
    }

    #[test]
    fn test_profiles_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        store.persist(&PersonalizationModel::new(1), "a").unwrap();
        store.persist(&PersonalizationModel::new(2), "b").unwrap();

        assert_ne!(store.load("a").unwrap(), store.load("b").unwrap());
        store.delete_profile("a").unwrap();
        assert!(store.load("a").unwrap().is_none());
        assert!(store.load("b").unwrap().is_some());
    }

    #[test]
    fn test_sample_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());

        assert_eq!(store.append_sample("p", sample(0.2)).unwrap(), 1);
        assert_eq!(store.append_sample("p", sample(0.4)).unwrap(), 2);
        assert_eq!(store.load_samples("p").unwrap(), vec![sample(0.2), sample(0.4)]);
        assert_eq!(store.profile_ids().unwrap(), vec!["p".to_string()]);
    }

    #[test]
    fn test_corrupt_model_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path());
        fs::write(dir.path().join("p.model.json"), b"[1, 2").unwrap();

        assert!(matches!(
            store.load("p"),
            Err(PersonalizationError::Persistence { .. })
        ));
    }

    #[test]
    fn test_rejects_path_like_profile_ids() {
        let store = ProfileStore::new("/tmp/unused");
        assert!(store.load("../etc").is_err());
        assert!(store.load("").is_err());
    }
}

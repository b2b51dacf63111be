// PersonalizationManager: Focused manager for per-profile personalization
//
// Single Responsibility: Active profile, its correction samples and model

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::PersonalizationConfig;
use crate::error::{log_personalization_error, PersonalizationError};
use crate::personalization::{
    EmotionCoordinate, PersonalizationModel, ProfileStore, TrainingSample,
};
use crate::suggestion::EmotionSuggestion;

/// State owned by the active profile
struct ActiveProfile {
    id: String,
    samples: Vec<TrainingSample>,
    model: Option<Arc<PersonalizationModel>>,
}

/// Summary of a completed retraining pass
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub profile_id: String,
    pub samples: usize,
    pub epochs: usize,
    pub final_loss: f32,
}

/// Manages the active personalization profile
///
/// This manager handles:
/// - Switching profiles (loading samples and model from the store)
/// - Recording user corrections as training samples
/// - Retraining once enough samples exist
/// - Correcting suggestions with the active model
///
/// Persistence failures are logged and never block suggestions: without a
/// loadable model, suggestions pass through unchanged.
///
/// # Example
/// ```ignore
/// let manager = PersonalizationManager::new(store, config);
/// manager.switch_profile("alice")?;
/// manager.record_correction(suggested, corrected)?;
/// if manager.can_train() {
///     manager.retrain()?;
/// }
/// let corrected = manager.apply(&suggestions);
/// ```
pub struct PersonalizationManager {
    store: ProfileStore,
    config: PersonalizationConfig,
    active: RwLock<Option<ActiveProfile>>,
}

impl PersonalizationManager {
    /// Create a manager with no active profile
    pub fn new(store: ProfileStore, config: PersonalizationConfig) -> Self {
        Self {
            store,
            config,
            active: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Make `profile_id` the active profile
    ///
    /// Loads the profile's sample log and model. A missing or unreadable
    /// model leaves the profile without one (pass-through predictions).
    ///
    /// # Errors
    /// - Invalid profile id
    /// - Lock poisoning on profile state
    pub fn switch_profile(&self, profile_id: &str) -> Result<(), PersonalizationError> {
        if !ProfileStore::is_valid_profile_id(profile_id) {
            let err = PersonalizationError::Persistence {
                details: format!("invalid profile id {:?}", profile_id),
            };
            log_personalization_error(&err, "switch_profile");
            return Err(err);
        }

        let samples = self
            .store
            .load_samples(profile_id)
            .inspect_err(|err| log_personalization_error(err, "switch_profile"))
            .unwrap_or_default();

        let model = self
            .store
            .load(profile_id)
            .inspect_err(|err| log_personalization_error(err, "switch_profile"))
            .ok()
            .flatten()
            .map(Arc::new);

        log::info!(
            "[PersonalizationManager] Active profile {} ({} samples, model: {})",
            profile_id,
            samples.len(),
            model.is_some()
        );

        let mut active = self.write_active()?;
        *active = Some(ActiveProfile {
            id: profile_id.to_string(),
            samples,
            model,
        });
        Ok(())
    }

    /// Id of the active profile, if any
    pub fn active_profile(&self) -> Option<String> {
        self.read_active()
            .ok()
            .and_then(|active| active.as_ref().map(|p| p.id.clone()))
    }

    /// Number of samples collected for the active profile
    pub fn sample_count(&self) -> usize {
        self.read_active()
            .ok()
            .and_then(|active| active.as_ref().map(|p| p.samples.len()))
            .unwrap_or(0)
    }

    /// Whether the active profile has a trained model
    pub fn has_model(&self) -> bool {
        self.read_active()
            .ok()
            .is_some_and(|active| active.as_ref().is_some_and(|p| p.model.is_some()))
    }

    /// Record a user correction for the active profile
    ///
    /// # Returns
    /// The number of samples now collected for the profile
    ///
    /// # Errors
    /// - No active profile
    /// - Coordinates outside valence [-1,1] / arousal [0,1]
    /// - Lock poisoning on profile state
    pub fn record_correction(
        &self,
        suggested: EmotionCoordinate,
        corrected: EmotionCoordinate,
    ) -> Result<usize, PersonalizationError> {
        let sample = TrainingSample::new(suggested, corrected);
        sample
            .validate()
            .inspect_err(|err| log_personalization_error(err, "record_correction"))?;

        let mut active = self.write_active()?;
        let profile = active.as_mut().ok_or(PersonalizationError::NoActiveProfile)?;
        profile.samples.push(sample);

        if let Err(err) = self.store.save_samples(&profile.id, &profile.samples) {
            log_personalization_error(&err, "record_correction");
        }

        Ok(profile.samples.len())
    }

    /// Record a marker created or edited at `time`
    ///
    /// Produces a training sample only when a suggestion lies within
    /// `proximity_seconds` of the marker; the nearest one is the input.
    pub fn record_marker_edit(
        &self,
        time: f64,
        valence: f32,
        arousal: f32,
        suggestions: &[EmotionSuggestion],
    ) -> Result<Option<TrainingSample>, PersonalizationError> {
        let proximity = self.config.proximity_seconds.max(0.0) as f64;
        let nearest = suggestions
            .iter()
            .map(|s| ((s.time - time).abs(), s))
            .filter(|(distance, _)| *distance <= proximity)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, s)| s);

        let Some(suggestion) = nearest else {
            tracing::debug!(
                "[PersonalizationManager] Marker at {:.2}s has no suggestion within {:.1}s",
                time,
                proximity
            );
            return Ok(None);
        };

        let sample = TrainingSample::new(
            EmotionCoordinate::new(suggestion.valence, suggestion.arousal),
            EmotionCoordinate::new(valence, arousal),
        );
        self.record_correction(sample.input, sample.output)?;
        Ok(Some(sample))
    }

    /// Whether enough samples exist to offer retraining
    pub fn can_train(&self) -> bool {
        self.sample_count() >= self.config.min_samples
    }

    /// Retrain the active profile's model from all its samples
    ///
    /// The new model replaces the old one wholesale.
    ///
    /// # Errors
    /// - No active profile
    /// - Fewer than `min_samples` samples collected
    /// - Lock poisoning on profile state
    pub fn retrain(&self) -> Result<TrainingReport, PersonalizationError> {
        let (profile_id, samples) = {
            let active = self.read_active()?;
            let profile = active.as_ref().ok_or(PersonalizationError::NoActiveProfile)?;
            (profile.id.clone(), profile.samples.clone())
        };

        if samples.len() < self.config.min_samples {
            let err = PersonalizationError::InsufficientSamples {
                required: self.config.min_samples,
                collected: samples.len(),
            };
            log_personalization_error(&err, "retrain");
            return Err(err);
        }

        let model = PersonalizationModel::train(&samples, &self.config)
            .inspect_err(|err| log_personalization_error(err, "retrain"))?;

        if let Err(err) = self.store.persist(&model, &profile_id) {
            log_personalization_error(&err, "retrain");
        }

        let report = TrainingReport {
            profile_id: profile_id.clone(),
            samples: samples.len(),
            epochs: self.config.epochs,
            final_loss: model.final_loss,
        };

        let mut active = self.write_active()?;
        if let Some(profile) = active.as_mut().filter(|p| p.id == profile_id) {
            profile.model = Some(Arc::new(model));
        }

        Ok(report)
    }

    /// Correct suggestions with the active model
    ///
    /// Returns the input unchanged when there is no active profile, no
    /// model, or the state lock is poisoned.
    pub fn apply(&self, suggestions: &[EmotionSuggestion]) -> Vec<EmotionSuggestion> {
        let model = self
            .read_active()
            .ok()
            .and_then(|active| active.as_ref().and_then(|p| p.model.clone()));

        match model {
            Some(model) => model.predict(suggestions),
            None => suggestions.to_vec(),
        }
    }

    /// Delete the active profile's files and deactivate it
    pub fn delete_active_profile(&self) -> Result<(), PersonalizationError> {
        let mut active = self.write_active()?;
        let profile = active.take().ok_or(PersonalizationError::NoActiveProfile)?;
        self.store
            .delete_profile(&profile.id)
            .inspect_err(|err| log_personalization_error(err, "delete_active_profile"))
    }

    // ========================================================================
    // HELPER METHODS - Lock management
    // ========================================================================

    fn read_active(&self) -> Result<RwLockReadGuard<'_, Option<ActiveProfile>>, PersonalizationError> {
        self.active
            .read()
            .map_err(|_| PersonalizationError::LockPoisoned)
    }

    fn write_active(
        &self,
    ) -> Result<RwLockWriteGuard<'_, Option<ActiveProfile>>, PersonalizationError> {
        self.active
            .write()
            .map_err(|_| PersonalizationError::LockPoisoned)
    }
}

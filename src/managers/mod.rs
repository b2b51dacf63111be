// Managers Module
//
// Focused manager classes owning one piece of shared mutable state each.
//
// - PersonalizationManager: Active profile, correction samples and model

pub mod personalization_manager;

pub use personalization_manager::{PersonalizationManager, TrainingReport};

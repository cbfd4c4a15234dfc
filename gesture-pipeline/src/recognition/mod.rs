//! Gesture Recognition
//!
//! Maps feature vectors to discrete gesture events.
//!
//! - `templates`: Gesture templates and the bounded vocabulary
//! - `debounce`: Time-windowed suppression of repeated detections
//! - `matcher`: Template-matching classifier (default backend)
//! - `model`: Weighted-centroid classifier behind a timed lock

pub mod debounce;
pub mod matcher;
pub mod model;
pub mod templates;

pub use debounce::{DebouncePhase, DebounceState};
pub use matcher::TemplateClassifier;
pub use model::{ClassModel, ModelClassifier, ModelHandle, ModelStats, ModelWeights};
pub use templates::{GestureTemplate, Vocabulary};

use crate::processing::features::FeatureVector;
use crate::time::clock::Timestamp;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default acceptance threshold
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

/// Default acceptance threshold for dynamic gestures (model backend)
pub const DEFAULT_DYNAMIC_THRESHOLD: f32 = 0.6;

/// Longest duration reported for a held gesture
pub const MAX_GESTURE_DURATION_MS: u64 = 2000;

/// An accepted gesture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Index of the gesture in the active vocabulary or model
    pub gesture_id: u8,
    pub name: String,
    /// Match score, `[0, 1]`
    pub confidence: f32,
    pub is_dynamic: bool,
    /// How long the gesture has been held (capped)
    pub duration_ms: u64,
    /// Time of the tick that produced the result
    pub timestamp: Timestamp,
    /// Sequence number of that tick's sample
    pub sequence: u64,
}

/// Pluggable scoring strategy
///
/// `classify` returns `Ok(None)` when nothing qualifies or the detection is
/// debounced; that is not an error.
pub trait GestureClassifier: Send {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Classify one feature vector
    fn classify(&mut self, features: &FeatureVector) -> Result<Option<RecognitionResult>>;

    /// Add a gesture at runtime
    fn add_template(&mut self, template: GestureTemplate) -> Result<()> {
        Err(Error::Unsupported(format!(
            "{} does not accept templates (got {:?})",
            self.name(),
            template.name
        )))
    }

    /// Change the acceptance threshold
    fn set_confidence_threshold(&mut self, threshold: f32) -> Result<()>;
}

impl<C: GestureClassifier + ?Sized> GestureClassifier for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn classify(&mut self, features: &FeatureVector) -> Result<Option<RecognitionResult>> {
        (**self).classify(features)
    }

    fn add_template(&mut self, template: GestureTemplate) -> Result<()> {
        (**self).add_template(template)
    }

    fn set_confidence_threshold(&mut self, threshold: f32) -> Result<()> {
        (**self).set_confidence_threshold(threshold)
    }
}

/// Reject thresholds outside `[0, 1]`
pub(crate) fn validate_threshold(threshold: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(Error::InvalidArgument(format!(
            "confidence threshold {} outside [0, 1]",
            threshold
        )));
    }
    Ok(())
}

/// Similarity of two equally long feature slices: mean of `1 / (1 + |x - t|)`
pub(crate) fn similarity(features: &[f32], reference: &[f32]) -> f32 {
    let count = features.len().min(reference.len());
    if count == 0 {
        return 0.0;
    }
    let total: f32 = features
        .iter()
        .zip(reference)
        .map(|(x, t)| 1.0 / (1.0 + (x - t).abs()))
        .sum();
    total / count as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_identical_is_one() {
        assert_eq!(similarity(&[70.0; 10], &[70.0; 10]), 1.0);
    }

    #[test]
    fn test_similarity_decreases_with_distance() {
        let near = similarity(&[1.0], &[0.0]);
        let far = similarity(&[9.0], &[0.0]);
        assert_eq!(near, 0.5);
        assert!(far < near);
    }

    #[test]
    fn test_similarity_empty_is_zero() {
        assert_eq!(similarity(&[], &[1.0]), 0.0);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(-0.1).is_err());
        assert!(validate_threshold(1.5).is_err());
        assert!(validate_threshold(f32::NAN).is_err());
    }
}

//! Template Matching Classifier
//!
//! Scores the feature vector against every template whose feature count
//! fits within the vector, keeps the best (earliest on ties), applies the
//! confidence threshold, and debounces repeats.

use super::debounce::DebounceState;
use super::templates::{GestureTemplate, Vocabulary};
use super::{
    similarity, validate_threshold, GestureClassifier, RecognitionResult,
    DEFAULT_CONFIDENCE_THRESHOLD,
};
use crate::processing::features::FeatureVector;
use crate::{Error, Result};
use std::time::Duration;
use tracing::{debug, info};

/// Best-scoring template for one vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    /// Gesture id (vocabulary index)
    pub index: usize,
    pub score: f32,
}

/// Default classifier backend; needs no lock
#[derive(Debug, Clone)]
pub struct TemplateClassifier {
    vocabulary: Vocabulary,
    threshold: f32,
    debounce: DebounceState,
}

impl Default for TemplateClassifier {
    fn default() -> Self {
        Self::new(Vocabulary::builtin())
    }
}

impl TemplateClassifier {
    /// Classifier with default threshold and debounce window
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary,
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            debounce: DebounceState::default(),
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Result<Self> {
        self.set_confidence_threshold(threshold)?;
        Ok(self)
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Result<Self> {
        if window.is_zero() {
            return Err(Error::InvalidArgument(
                "debounce window must be > 0".to_string(),
            ));
        }
        self.debounce.set_window(window);
        Ok(self)
    }

    /// Score of one template, `None` when it needs more features than given
    pub fn template_score(template: &GestureTemplate, features: &FeatureVector) -> Option<f32> {
        if template.feature_count > features.feature_count() {
            return None;
        }
        let compared = template.compared();
        Some(similarity(&features.as_slice()[..compared.len()], compared))
    }

    /// Highest-scoring template without thresholding or debouncing
    pub fn best_match(&self, features: &FeatureVector) -> Option<TemplateMatch> {
        let mut best: Option<TemplateMatch> = None;

        for (index, template) in self.vocabulary.iter().enumerate() {
            let Some(score) = Self::template_score(template, features) else {
                continue;
            };
            // Strict comparison keeps the earliest template on ties
            if score > best.map_or(0.0, |b| b.score) {
                best = Some(TemplateMatch { index, score });
            }
        }

        best
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn debounce(&self) -> &DebounceState {
        &self.debounce
    }
}

impl GestureClassifier for TemplateClassifier {
    fn name(&self) -> &str {
        "template"
    }

    fn classify(&mut self, features: &FeatureVector) -> Result<Option<RecognitionResult>> {
        if self.vocabulary.is_empty() {
            return Err(Error::InvalidState("vocabulary is empty".to_string()));
        }

        let candidate = self.best_match(features).and_then(|m| {
            let template = self.vocabulary.get_by_index(m.index).ok()?;
            let threshold = template.confidence_threshold.unwrap_or(self.threshold);
            (m.score >= threshold).then_some((m, template))
        });

        let now = features.timestamp;
        let Some((best, template)) = candidate else {
            self.debounce.observe(None, now);
            return Ok(None);
        };

        let Some(duration_ms) = self.debounce.observe(Some(&template.name), now) else {
            debug!(gesture = %template.name, score = best.score, "Debounced repeat detection");
            return Ok(None);
        };

        let gesture_id = u8::try_from(best.index)
            .map_err(|_| Error::InvalidState(format!("gesture id {} out of range", best.index)))?;

        info!(gesture = %template.name, confidence = best.score, "Gesture detected");

        Ok(Some(RecognitionResult {
            gesture_id,
            name: template.name.clone(),
            confidence: best.score,
            is_dynamic: template.is_dynamic,
            duration_ms,
            timestamp: now,
            sequence: features.sequence,
        }))
    }

    fn add_template(&mut self, template: GestureTemplate) -> Result<()> {
        let index = self.vocabulary.add(template)?;
        debug!(index, total = self.vocabulary.len(), "Template added");
        Ok(())
    }

    fn set_confidence_threshold(&mut self, threshold: f32) -> Result<()> {
        validate_threshold(threshold)?;
        self.threshold = threshold;
        Ok(())
    }
}

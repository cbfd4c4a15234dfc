//! Weighted-Centroid Model Classifier
//!
//! Alternative backend whose class model can be swapped at runtime through a
//! [`ModelHandle`]. The model lives behind a `parking_lot::Mutex`; every
//! access waits at most `lock_timeout` and fails with `Timeout` otherwise.
//!
//! Class score over the class's centroid length:
//!
//! ```text
//! score = Σ w_i / (1 + |x_i - c_i|)  /  Σ w_i
//! ```
//!
//! Missing weights mean uniform weighting. Static and dynamic classes have
//! separate acceptance thresholds.

use super::debounce::DebounceState;
use super::templates::{MAX_GESTURE_NAME_LEN, MAX_TEMPLATES};
use super::{
    validate_threshold, GestureClassifier, RecognitionResult, DEFAULT_CONFIDENCE_THRESHOLD,
    DEFAULT_DYNAMIC_THRESHOLD,
};
use crate::processing::features::{FeatureVector, FEATURE_CAPACITY};
use crate::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default wait for the model lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// One gesture class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassModel {
    pub name: String,
    #[serde(default)]
    pub is_dynamic: bool,
    pub centroid: Vec<f32>,
    /// Per-feature weights; empty means uniform
    #[serde(default)]
    pub weights: Vec<f32>,
}

impl ClassModel {
    fn weight(&self, i: usize) -> f32 {
        self.weights.get(i).copied().unwrap_or(1.0)
    }

    /// Score against `features`, `None` when the class needs more features
    pub fn score(&self, features: &FeatureVector) -> Option<f32> {
        if self.centroid.len() > features.feature_count() {
            return None;
        }

        let mut weighted = 0.0f32;
        let mut total_weight = 0.0f32;
        for (i, (x, c)) in features.as_slice().iter().zip(&self.centroid).enumerate() {
            let w = self.weight(i);
            weighted += w / (1.0 + (x - c).abs());
            total_weight += w;
        }

        (total_weight > 0.0).then(|| weighted / total_weight)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > MAX_GESTURE_NAME_LEN {
            return Err(Error::InvalidArgument(format!(
                "class name {:?} must be 1-{} bytes",
                self.name, MAX_GESTURE_NAME_LEN
            )));
        }
        if self.centroid.is_empty() || self.centroid.len() > FEATURE_CAPACITY {
            return Err(Error::InvalidArgument(format!(
                "class {:?}: centroid length {} must be in 1..={}",
                self.name,
                self.centroid.len(),
                FEATURE_CAPACITY
            )));
        }
        if !self.weights.is_empty() && self.weights.len() != self.centroid.len() {
            return Err(Error::InvalidArgument(format!(
                "class {:?}: {} weights for {} centroid values",
                self.name,
                self.weights.len(),
                self.centroid.len()
            )));
        }
        if self.weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidArgument(format!(
                "class {:?}: weights must be finite and non-negative",
                self.name
            )));
        }
        Ok(())
    }
}

/// Complete class model, as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    pub classes: Vec<ClassModel>,
}

impl ModelWeights {
    pub fn validate(&self) -> Result<()> {
        if self.classes.len() > MAX_TEMPLATES {
            return Err(Error::ResourceExhausted(format!(
                "model holds at most {} classes, got {}",
                MAX_TEMPLATES,
                self.classes.len()
            )));
        }
        self.classes.iter().try_for_each(ClassModel::validate)
    }

    /// Load and validate a JSON model file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let weights: ModelWeights = serde_json::from_str(&content)?;
        weights.validate()?;
        info!(path = %path.display(), classes = weights.classes.len(), "Loaded gesture model");
        Ok(weights)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Shared access to a classifier's model from other threads
#[derive(Debug, Clone)]
pub struct ModelHandle {
    weights: Arc<Mutex<ModelWeights>>,
    lock_timeout: Duration,
}

impl ModelHandle {
    /// Replace the model
    pub fn replace(&self, weights: ModelWeights) -> Result<()> {
        weights.validate()?;
        let mut guard = self
            .weights
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| lock_timeout_error(self.lock_timeout))?;
        *guard = weights;
        Ok(())
    }

    /// Number of loaded classes
    pub fn class_count(&self) -> Result<usize> {
        let guard = self
            .weights
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| lock_timeout_error(self.lock_timeout))?;
        Ok(guard.classes.len())
    }
}

fn lock_timeout_error(timeout: Duration) -> Error {
    Error::Timeout(format!("model lock not acquired within {:?}", timeout))
}

/// Inference statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ModelStats {
    pub inferences: u64,
    /// Running mean inference time (microseconds)
    pub mean_inference_us: f64,
    pub lock_timeouts: u64,
}

/// Model-backed classifier
pub struct ModelClassifier {
    weights: Arc<Mutex<ModelWeights>>,
    lock_timeout: Duration,
    static_threshold: f32,
    dynamic_threshold: f32,
    debounce: DebounceState,
    stats: ModelStats,
}

impl ModelClassifier {
    pub fn new(weights: ModelWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self {
            weights: Arc::new(Mutex::new(weights)),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            static_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            dynamic_threshold: DEFAULT_DYNAMIC_THRESHOLD,
            debounce: DebounceState::default(),
            stats: ModelStats::default(),
        })
    }

    /// Load the model from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        Self::new(ModelWeights::load(path)?)
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::InvalidArgument("lock timeout must be > 0".to_string()));
        }
        self.lock_timeout = timeout;
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

    /// Set the static and dynamic acceptance thresholds
    pub fn set_kind_thresholds(&mut self, static_threshold: f32, dynamic_threshold: f32) -> Result<()> {
        validate_threshold(static_threshold)?;
        validate_threshold(dynamic_threshold)?;
        self.static_threshold = static_threshold;
        self.dynamic_threshold = dynamic_threshold;
        Ok(())
    }

    pub fn thresholds(&self) -> (f32, f32) {
        (self.static_threshold, self.dynamic_threshold)
    }

    pub fn handle(&self) -> ModelHandle {
        ModelHandle {
            weights: Arc::clone(&self.weights),
            lock_timeout: self.lock_timeout,
        }
    }

    pub fn stats(&self) -> ModelStats {
        self.stats
    }

    fn record_inference(&mut self, elapsed: Duration) {
        self.stats.inferences += 1;
        let n = self.stats.inferences as f64;
        let sample = elapsed.as_secs_f64() * 1e6;
        self.stats.mean_inference_us += (sample - self.stats.mean_inference_us) / n;
    }
}

/// Best class found while the lock was held
struct ModelMatch {
    index: usize,
    name: String,
    is_dynamic: bool,
    score: f32,
}

impl GestureClassifier for ModelClassifier {
    fn name(&self) -> &str {
        "model"
    }

    fn classify(&mut self, features: &FeatureVector) -> Result<Option<RecognitionResult>> {
        let started = Instant::now();

        let best = {
            let Some(weights) = self.weights.try_lock_for(self.lock_timeout) else {
                self.stats.lock_timeouts += 1;
                return Err(lock_timeout_error(self.lock_timeout));
            };
            if weights.classes.is_empty() {
                return Err(Error::InvalidState("model has no classes loaded".to_string()));
            }

            let mut best: Option<ModelMatch> = None;
            for (index, class) in weights.classes.iter().enumerate() {
                let Some(score) = class.score(features) else {
                    continue;
                };
                if score > best.as_ref().map_or(0.0, |b| b.score) {
                    best = Some(ModelMatch {
                        index,
                        name: class.name.clone(),
                        is_dynamic: class.is_dynamic,
                        score,
                    });
                }
            }
            best
        };

        self.record_inference(started.elapsed());

        let now = features.timestamp;
        let candidate = best.filter(|m| {
            let threshold = if m.is_dynamic {
                self.dynamic_threshold
            } else {
                self.static_threshold
            };
            m.score >= threshold
        });

        let Some(best) = candidate else {
            self.debounce.observe(None, now);
            return Ok(None);
        };

        let Some(duration_ms) = self.debounce.observe(Some(&best.name), now) else {
            debug!(gesture = %best.name, score = best.score, "Debounced repeat detection");
            return Ok(None);
        };

        let gesture_id = u8::try_from(best.index)
            .map_err(|_| Error::InvalidState(format!("class id {} out of range", best.index)))?;

        info!(gesture = %best.name, confidence = best.score, backend = "model", "Gesture detected");

        Ok(Some(RecognitionResult {
            gesture_id,
            name: best.name,
            confidence: best.score,
            is_dynamic: best.is_dynamic,
            duration_ms,
            timestamp: now,
            sequence: features.sequence,
        }))
    }

    /// Sets the static and dynamic thresholds to the same value
    fn set_confidence_threshold(&mut self, threshold: f32) -> Result<()> {
        self.set_kind_thresholds(threshold, threshold)
    }
}

//! Gesture Templates and Vocabulary
//!
//! A template is a reference feature vector plus the number of leading
//! features it constrains. The vocabulary is the ordered, bounded set of
//! templates a classifier matches against; a template's position is its
//! gesture id.

use super::validate_threshold;
use crate::processing::features::FEATURE_CAPACITY;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Maximum number of templates in a vocabulary
pub const MAX_TEMPLATES: usize = 50;

/// Maximum gesture name length in bytes
pub const MAX_GESTURE_NAME_LEN: usize = 32;

/// Reference pattern for one gesture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureTemplate {
    pub name: String,
    /// Reference feature values
    pub reference: Vec<f32>,
    /// Leading features compared against the input
    pub feature_count: usize,
    /// Motion gesture rather than a held pose
    #[serde(default)]
    pub is_dynamic: bool,
    /// Overrides the classifier-wide threshold for this gesture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f32>,
}

impl GestureTemplate {
    /// Static template comparing every reference value
    pub fn new(name: impl Into<String>, reference: Vec<f32>) -> Self {
        let feature_count = reference.len();
        Self {
            name: name.into(),
            reference,
            feature_count,
            is_dynamic: false,
            confidence_threshold: None,
        }
    }

    pub fn dynamic(mut self) -> Self {
        self.is_dynamic = true;
        self
    }

    pub fn with_feature_count(mut self, feature_count: usize) -> Self {
        self.feature_count = feature_count;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    /// The compared prefix of the reference
    pub fn compared(&self) -> &[f32] {
        let end = self.feature_count.min(self.reference.len());
        &self.reference[..end]
    }

    /// Check name, feature count, and threshold
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > MAX_GESTURE_NAME_LEN {
            return Err(Error::InvalidArgument(format!(
                "gesture name {:?} must be 1-{} bytes",
                self.name, MAX_GESTURE_NAME_LEN
            )));
        }
        if self.reference.len() > FEATURE_CAPACITY {
            return Err(Error::InvalidArgument(format!(
                "gesture {:?}: reference of {} values exceeds {}",
                self.name,
                self.reference.len(),
                FEATURE_CAPACITY
            )));
        }
        if self.feature_count == 0 || self.feature_count > self.reference.len() {
            return Err(Error::InvalidArgument(format!(
                "gesture {:?}: feature_count {} must be in 1..={}",
                self.name,
                self.feature_count,
                self.reference.len()
            )));
        }
        if let Some(threshold) = self.confidence_threshold {
            validate_threshold(threshold)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct VocabularyFile {
    templates: Vec<GestureTemplate>,
}

/// Ordered, bounded template set
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    templates: Vec<GestureTemplate>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Vocabulary {
    /// Vocabulary with no templates
    pub fn empty() -> Self {
        Self {
            templates: Vec::new(),
        }
    }

    /// Built-in fingerspelling set
    pub fn builtin() -> Self {
        // Fist with the thumb resting alongside
        let mut fist = [70.0f32; 10];
        fist[0] = 30.0;
        fist[1] = 40.0;

        Self {
            templates: vec![
                GestureTemplate::new("A", fist.to_vec()),
                GestureTemplate::new("B", vec![0.0; 10]),
            ],
        }
    }

    /// Insert a template, replacing any with the same name.
    /// Returns the template's gesture id.
    pub fn add(&mut self, template: GestureTemplate) -> Result<usize> {
        template.validate()?;

        if let Some(index) = self.index_of(&template.name) {
            debug!(name = %template.name, index, "Replacing gesture template");
            self.templates[index] = template;
            return Ok(index);
        }

        if self.templates.len() >= MAX_TEMPLATES {
            return Err(Error::ResourceExhausted(format!(
                "vocabulary holds at most {} templates",
                MAX_TEMPLATES
            )));
        }

        self.templates.push(template);
        Ok(self.templates.len() - 1)
    }

    pub fn get_by_name(&self, name: &str) -> Result<&GestureTemplate> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::NotFound(format!("gesture {:?}", name)))
    }

    pub fn get_by_index(&self, index: usize) -> Result<&GestureTemplate> {
        self.templates
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("gesture id {}", index)))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.templates.iter().position(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates in gesture-id order
    pub fn iter(&self) -> impl Iterator<Item = &GestureTemplate> {
        self.templates.iter()
    }

    /// Restore the built-in templates
    pub fn reset(&mut self) {
        *self = Self::builtin();
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let file: VocabularyFile = serde_json::from_str(&content)?;

        let mut vocabulary = Self::empty();
        for template in file.templates {
            vocabulary.add(template)?;
        }

        info!(path = %path.display(), templates = vocabulary.len(), "Loaded vocabulary");
        Ok(vocabulary)
    }

    /// Save as JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = VocabularyFile {
            templates: self.templates.clone(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

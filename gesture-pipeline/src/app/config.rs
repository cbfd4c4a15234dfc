//! Configuration Management

use crate::output::OutputMode;
use crate::sensors::sampler::SamplerSchedule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Sensor sampling settings
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// Queue and history sizing
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Recognition settings
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Sampler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Flex sensor period (ms)
    pub flex_period_ms: u64,
    /// IMU period (ms)
    pub imu_period_ms: u64,
    /// Touch polling period (ms)
    pub touch_period_ms: u64,
    /// Camera capture period (ms)
    pub camera_period_ms: u64,
    pub touch_enabled: bool,
    pub camera_enabled: bool,
    /// Upper bound for one driver read (ms)
    pub read_timeout_ms: u64,
    /// Sleep between sampler iterations (ms)
    pub idle_delay_ms: u64,
}

/// Pipeline sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// History ring depth (samples)
    pub history_capacity: usize,
    /// Sampler to processing queue
    pub sensor_queue_capacity: usize,
    /// Processing to output queue
    pub result_queue_capacity: usize,
    /// Receive wait before housekeeping (ms)
    pub recv_timeout_ms: u64,
}

/// Classifier backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    #[default]
    Template,
    Model,
}

/// Recognition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub backend: ClassifierBackend,
    /// Acceptance threshold, static gestures
    pub confidence_threshold: f32,
    /// Acceptance threshold, dynamic gestures (model backend)
    pub dynamic_confidence_threshold: f32,
    /// Repeat suppression window (ms)
    pub debounce_window_ms: u64,
    /// Model lock wait (ms)
    pub lock_timeout_ms: u64,
    /// Vocabulary file; built-in templates when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocabulary_path: Option<PathBuf>,
    /// Model file, required by the model backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub mode: OutputMode,
    /// Haptic pulse strength, percent (0 disables outside minimal mode)
    pub haptic_intensity: u8,
    /// Haptic pulse length (ms)
    pub haptic_duration_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            flex_period_ms: 20,
            imu_period_ms: 10,
            touch_period_ms: 50,
            camera_period_ms: 66,
            touch_enabled: true,
            camera_enabled: false,
            read_timeout_ms: 5,
            idle_delay_ms: 5,
        }
    }
}

impl SamplerConfig {
    pub fn schedule(&self) -> SamplerSchedule {
        SamplerSchedule {
            flex_period: Duration::from_millis(self.flex_period_ms),
            imu_period: Duration::from_millis(self.imu_period_ms),
            touch_period: Duration::from_millis(self.touch_period_ms),
            camera_period: Duration::from_millis(self.camera_period_ms),
            touch_enabled: self.touch_enabled,
            camera_enabled: self.camera_enabled,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            idle_delay: Duration::from_millis(self.idle_delay_ms),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_capacity: 20,
            sensor_queue_capacity: 10,
            result_queue_capacity: 5,
            recv_timeout_ms: 100,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            backend: ClassifierBackend::Template,
            confidence_threshold: 0.7,
            dynamic_confidence_threshold: 0.6,
            debounce_window_ms: 500,
            lock_timeout_ms: 100,
            vocabulary_path: None,
            model_path: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::TextOnly,
            haptic_intensity: 80,
            haptic_duration_ms: 100,
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        let periods = [
            ("flex_period_ms", self.sampler.flex_period_ms),
            ("imu_period_ms", self.sampler.imu_period_ms),
            ("touch_period_ms", self.sampler.touch_period_ms),
            ("camera_period_ms", self.sampler.camera_period_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(crate::Error::Config(format!("{} must be > 0", name)));
            }
        }

        let capacities = [
            ("history_capacity", self.pipeline.history_capacity),
            ("sensor_queue_capacity", self.pipeline.sensor_queue_capacity),
            ("result_queue_capacity", self.pipeline.result_queue_capacity),
        ];
        for (name, value) in capacities {
            if value == 0 {
                return Err(crate::Error::Config(format!("{} must be > 0", name)));
            }
        }
        if self.pipeline.recv_timeout_ms == 0 {
            return Err(crate::Error::Config("recv_timeout_ms must be > 0".to_string()));
        }

        for (name, value) in [
            ("confidence_threshold", self.classifier.confidence_threshold),
            (
                "dynamic_confidence_threshold",
                self.classifier.dynamic_confidence_threshold,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(crate::Error::Config(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.classifier.debounce_window_ms == 0 {
            return Err(crate::Error::Config("debounce_window_ms must be > 0".to_string()));
        }
        if self.classifier.lock_timeout_ms == 0 {
            return Err(crate::Error::Config("lock_timeout_ms must be > 0".to_string()));
        }
        if self.classifier.backend == ClassifierBackend::Model && self.classifier.model_path.is_none() {
            return Err(crate::Error::Config(
                "model backend requires model_path".to_string(),
            ));
        }

        if self.output.haptic_intensity > 100 {
            return Err(crate::Error::Config(format!(
                "haptic_intensity must be in [0, 100], got {}",
                self.output.haptic_intensity
            )));
        }
        Ok(())
    }

    /// Load config from file
    pub fn load(path: &PathBuf) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &PathBuf) -> Result<(), crate::Error> {
        let content = self.to_toml()?;

        // Create parent directories
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".glove_pipeline").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.history_capacity, 20);
        assert_eq!(config.classifier.confidence_threshold, 0.7);
        assert_eq!(config.classifier.debounce_window_ms, 500);
        assert_eq!(config.output.mode, OutputMode::TextOnly);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[sampler]"));
        assert!(toml.contains("[pipeline]"));
        assert!(toml.contains("[classifier]"));
        assert!(toml.contains("[output]"));
        assert!(toml.contains("mode = \"text_only\""));
    }

    #[test]
    fn test_default_path() {
        let path = Config::default_path();
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_sampler_schedule_conversion() {
        let schedule = SamplerConfig::default().schedule();
        assert_eq!(schedule, SamplerSchedule::default());
    }

    #[test]
    fn test_config_roundtrip_serialization() {
        let mut original = Config::default();
        original.classifier.vocabulary_path = Some(PathBuf::from("/tmp/vocab.json"));
        let toml_str = original.to_toml().unwrap();
        let deserialized: Config = toml::from_str(&toml_str).expect("Failed to deserialize");
        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let mut original = Config::default();
        original.pipeline.history_capacity = 40;
        original.classifier.confidence_threshold = 0.8;
        original.output.mode = OutputMode::Minimal;

        original.save(&config_path).expect("Failed to save config");
        assert!(config_path.exists());

        let loaded = Config::load(&config_path).expect("Failed to load config");
        assert_eq!(loaded.pipeline.history_capacity, 40);
        assert_eq!(loaded.classifier.confidence_threshold, 0.8);
        assert_eq!(loaded.output.mode, OutputMode::Minimal);
    }

    #[test]
    fn test_config_save_creates_parent_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let nested_path = temp_dir.path().join("nested").join("path").join("config.toml");

        Config::default().save(&nested_path).expect("Failed to save config");
        assert!(nested_path.exists());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load(&PathBuf::from("/nonexistent/glove/config.toml"));
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.toml");
        std::fs::write(&path, "[classifier]\nconfidence_threshold = 0.9\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.classifier.confidence_threshold, 0.9);
        assert_eq!(config.classifier.debounce_window_ms, 500);
        assert_eq!(config.sampler, SamplerConfig::default());
    }

    #[test]
    fn test_invalid_toml_parsing() {
        let result: Result<Config, _> = toml::from_str("[pipeline\nhistory_capacity = ");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut config = Config::default();
        config.pipeline.sensor_queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_period() {
        let mut config = Config::default();
        config.sampler.imu_period_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_threshold_out_of_range() {
        let mut config = Config::default();
        config.classifier.confidence_threshold = 1.1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.classifier.dynamic_confidence_threshold = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_windows() {
        let mut config = Config::default();
        config.classifier.debounce_window_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.classifier.lock_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_model_backend_needs_path() {
        let mut config = Config::default();
        config.classifier.backend = ClassifierBackend::Model;
        assert!(config.validate().is_err());
        config.classifier.model_path = Some(PathBuf::from("model.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_haptic_intensity() {
        let mut config = Config::default();
        config.output.haptic_intensity = 101;
        assert!(config.validate().is_err());
        config.output.haptic_intensity = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("invalid.toml");
        std::fs::write(&path, "[pipeline]\nhistory_capacity = 0\n").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }
}

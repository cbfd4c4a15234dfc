//! # Gesture Pipeline
//!
//! The perception core of a wearable sign-language glove: it turns
//! multi-rate sensor streams (finger-joint flex angles, hand orientation and
//! motion, fingertip touch contacts, optional camera frames) into discrete
//! recognized-gesture events.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gesture_pipeline::app::config::Config;
//! use gesture_pipeline::pipeline::runtime::PipelineBuilder;
//! use gesture_pipeline::sensors::simulated::SimulatedGlove;
//!
//! let config = Config::default();
//! let glove = SimulatedGlove::new();
//! let handle = PipelineBuilder::new(config)
//!     .with_drivers(glove.drivers())
//!     .spawn()
//!     .expect("Failed to start pipeline");
//!
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! let stats = handle.shutdown();
//! println!("{:?}", stats);
//! ```
//!
//! ## Architecture
//!
//! - [`time`]: Monotonic millisecond clock, injectable for tests
//! - [`sensors`]: Sample model, driver traits, and the multi-rate sampler
//! - [`pipeline`]: Bounded SPSC channels, history ring, processing stage, threads
//! - [`processing`]: Sensor fusion and feature extraction
//! - [`recognition`]: Template vocabulary, classifiers, and debouncing
//! - [`output`]: Result dispatch and downstream sinks
//! - [`app`]: CLI and configuration management
//!
//! ## Data Flow
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │   Sampler   │───▶│   Sensor    │───▶│   History   │───▶│   Fusion    │
//! │ (multi-rate)│    │   channel   │    │   buffer    │    │             │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!                                                                 │
//!                                                                 ▼
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │    Sinks    │◀───│ Dispatcher  │◀───│ Classifier  │◀───│  Features   │
//! │ text/notify │    │ (per route) │    │ + debounce  │    │             │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//! ```

pub mod time;
pub mod sensors;
pub mod pipeline;
pub mod processing;
pub mod recognition;
pub mod output;
pub mod app;

// Re-export commonly used types
pub use pipeline::history::HistoryBuffer;
pub use processing::features::FeatureVector;
pub use recognition::{GestureClassifier, GestureTemplate, RecognitionResult, TemplateClassifier};
pub use sensors::types::{CameraFrame, FlexReading, ImuReading, Modality, Sample, TouchReading};
pub use time::clock::{Clock, ManualClock, MonotonicClock, Timestamp};

/// Result type alias for the gesture pipeline
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the gesture pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

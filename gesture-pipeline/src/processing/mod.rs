//! Per-tick signal processing
//!
//! - `fusion`: Tilt-compensated joint angles
//! - `features`: Fixed-layout feature vectors for classification

pub mod features;
pub mod fusion;

pub use features::{extract_features, FeatureVector, FEATURE_CAPACITY};
pub use fusion::{FusionStage, FusionStats};

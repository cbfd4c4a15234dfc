//! Sensor Layer
//!
//! - `types`: Per-modality readings and the per-tick [`types::Sample`]
//! - `drivers`: Hardware collaborator traits
//! - `simulated`: Scripted glove for demos, tests, and benches
//! - `sampler`: Multi-rate polling loop that assembles samples

pub mod drivers;
pub mod sampler;
pub mod simulated;
pub mod types;

pub use drivers::{
    CameraDriver, FlexMeasurement, FlexSensor, FrameView, ImuMeasurement, InertialSensor,
    SensorDrivers, TouchPushHandle, TouchSensor,
};
pub use sampler::{Sampler, SamplerSchedule, SamplerStats};
pub use simulated::{HandPose, SimulatedGlove};

//! Hardware Driver Interfaces
//!
//! The pipeline consumes sensors through these traits. Every read takes a
//! bounded timeout; a driver must return (with an error if need be) within
//! it so the sampler loop never stalls.

use super::types::{PixelFormat, FLEX_JOINT_COUNT, TOUCH_SENSOR_COUNT};
use crate::pipeline::channel::Sender;
use crate::{Error, Result};
use std::time::Duration;
use tracing::warn;

/// Flex sensor read result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlexMeasurement {
    /// Joint angles in degrees
    pub angles: [f32; FLEX_JOINT_COUNT],
    /// Raw ADC counts, if available
    pub raw: Option<[u16; FLEX_JOINT_COUNT]>,
}

/// Inertial sensor read result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuMeasurement {
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
    pub orientation: [f32; 3],
    pub temperature: f32,
}

/// Camera frame borrowed from the driver's buffer.
///
/// Valid until [`CameraDriver::release_frame`] is called.
#[derive(Debug)]
pub struct FrameView<'a> {
    pub bytes: &'a [u8],
    pub width: u16,
    pub height: u16,
    pub format: PixelFormat,
}

pub trait FlexSensor: Send {
    fn read_angles(&mut self, timeout: Duration) -> Result<FlexMeasurement>;
}

pub trait InertialSensor: Send {
    fn read(&mut self, timeout: Duration) -> Result<ImuMeasurement>;
}

pub trait TouchSensor: Send {
    /// Poll the current contact state
    fn read_status(&mut self, timeout: Duration) -> Result<[bool; TOUCH_SENSOR_COUNT]>;

    /// Register the handle used to push contact changes as they happen.
    /// Drivers without interrupt support keep the default.
    fn attach_push(&mut self, handle: TouchPushHandle) -> Result<()> {
        drop(handle);
        Err(Error::Unsupported("touch push notifications".to_string()))
    }
}

pub trait CameraDriver: Send {
    /// Capture a frame into the driver's buffer
    fn capture_frame(&mut self, timeout: Duration) -> Result<FrameView<'_>>;

    /// Return the buffer of the last captured frame to the driver
    fn release_frame(&mut self);
}

/// Producer side of the asynchronous touch channel.
///
/// Owned by whichever context receives touch interrupts.
pub struct TouchPushHandle {
    sender: Sender<[bool; TOUCH_SENSOR_COUNT]>,
}

impl TouchPushHandle {
    pub(crate) fn new(sender: Sender<[bool; TOUCH_SENSOR_COUNT]>) -> Self {
        Self { sender }
    }

    /// Push a contact change. Returns false if the push was dropped.
    pub fn push(&mut self, contacts: [bool; TOUCH_SENSOR_COUNT]) -> bool {
        match self.sender.try_send(contacts) {
            Ok(()) => true,
            Err(_) => {
                warn!(channel = self.sender.name(), "Touch push dropped (channel full)");
                false
            }
        }
    }
}

impl std::fmt::Debug for TouchPushHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TouchPushHandle")
            .field("channel", &self.sender.name())
            .finish()
    }
}

/// The set of drivers a sampler polls. Missing drivers are never due.
#[derive(Default)]
pub struct SensorDrivers {
    pub flex: Option<Box<dyn FlexSensor>>,
    pub imu: Option<Box<dyn InertialSensor>>,
    pub touch: Option<Box<dyn TouchSensor>>,
    pub camera: Option<Box<dyn CameraDriver>>,
}

impl std::fmt::Debug for SensorDrivers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorDrivers")
            .field("flex", &self.flex.is_some())
            .field("imu", &self.imu.is_some())
            .field("touch", &self.touch.is_some())
            .field("camera", &self.camera.is_some())
            .finish()
    }
}

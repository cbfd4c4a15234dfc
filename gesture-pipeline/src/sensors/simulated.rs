//! Simulated Glove
//!
//! Software stand-in for the glove hardware. All drivers read the same
//! shared [`HandPose`], which callers change at any time from any thread.
//! Read failures can be injected per modality, and the camera tracks
//! capture/release pairing so tests can check the release contract.

use super::drivers::{
    CameraDriver, FlexMeasurement, FlexSensor, FrameView, ImuMeasurement, InertialSensor,
    SensorDrivers, TouchPushHandle, TouchSensor,
};
use super::types::{Modality, PixelFormat, FLEX_JOINT_COUNT, TOUCH_SENSOR_COUNT};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Simulated frame size
const FRAME_WIDTH: u16 = 32;
const FRAME_HEIGHT: u16 = 24;

/// Full hand state presented by the simulated drivers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandPose {
    pub angles: [f32; FLEX_JOINT_COUNT],
    pub orientation: [f32; 3],
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
    pub touch: [bool; TOUCH_SENSOR_COUNT],
}

impl HandPose {
    /// Level hand at rest with the given joint angles
    pub fn with_angles(angles: [f32; FLEX_JOINT_COUNT]) -> Self {
        Self {
            angles,
            orientation: [0.0; 3],
            accel: [0.0, 0.0, 1.0],
            gyro: [0.0; 3],
            touch: [false; TOUCH_SENSOR_COUNT],
        }
    }

    /// Flat hand, fingers together
    pub fn flat() -> Self {
        Self::with_angles([0.0; FLEX_JOINT_COUNT])
    }

    /// Fist with the thumb alongside
    pub fn fist() -> Self {
        let mut angles = [70.0; FLEX_JOINT_COUNT];
        angles[0] = 30.0;
        angles[1] = 40.0;
        Self::with_angles(angles)
    }

    /// Half-curled resting hand; matches no built-in gesture
    pub fn relaxed() -> Self {
        Self::with_angles([35.0; FLEX_JOINT_COUNT])
    }

    /// Look up a pose by name (`flat`/`B`, `fist`/`A`, `relaxed`/`rest`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "flat" | "b" => Some(Self::flat()),
            "fist" | "a" => Some(Self::fist()),
            "relaxed" | "rest" => Some(Self::relaxed()),
            _ => None,
        }
    }

    pub fn tilted(mut self, roll: f32, pitch: f32) -> Self {
        self.orientation[0] = roll;
        self.orientation[1] = pitch;
        self
    }
}

impl Default for HandPose {
    fn default() -> Self {
        Self::relaxed()
    }
}

struct GloveState {
    pose: HandPose,
    /// Remaining injected failures per modality
    failures: [u32; 4],
    push: Option<TouchPushHandle>,
    frames_captured: u64,
    frames_released: u64,
    frame_outstanding: bool,
}

impl GloveState {
    fn take_failure(&mut self, modality: Modality) -> Result<()> {
        let remaining = &mut self.failures[modality.index()];
        if *remaining > 0 {
            *remaining -= 1;
            return Err(Error::Timeout(format!(
                "simulated {} read failure",
                modality.as_str()
            )));
        }
        Ok(())
    }
}

/// Shared simulated hardware; clones control the same glove
#[derive(Clone)]
pub struct SimulatedGlove {
    state: Arc<Mutex<GloveState>>,
}

impl Default for SimulatedGlove {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedGlove {
    pub fn new() -> Self {
        Self::with_pose(HandPose::default())
    }

    pub fn with_pose(pose: HandPose) -> Self {
        Self {
            state: Arc::new(Mutex::new(GloveState {
                pose,
                failures: [0; 4],
                push: None,
                frames_captured: 0,
                frames_released: 0,
                frame_outstanding: false,
            })),
        }
    }

    pub fn set_pose(&self, pose: HandPose) {
        self.state.lock().pose = pose;
    }

    pub fn pose(&self) -> HandPose {
        self.state.lock().pose
    }

    /// Make the next `count` reads of `modality` fail
    pub fn fail_reads(&self, modality: Modality, count: u32) {
        self.state.lock().failures[modality.index()] = count;
    }

    /// Change the touch state and push it through the interrupt path.
    ///
    /// Returns false if no push handle is attached or the push was dropped.
    pub fn press(&self, contacts: [bool; TOUCH_SENSOR_COUNT]) -> bool {
        let mut state = self.state.lock();
        state.pose.touch = contacts;
        match state.push.as_mut() {
            Some(handle) => handle.push(contacts),
            None => false,
        }
    }

    /// Frames captured and not yet released
    pub fn frames_outstanding(&self) -> u64 {
        let state = self.state.lock();
        state.frames_captured - state.frames_released
    }

    /// (captured, released) frame counts
    pub fn frame_counts(&self) -> (u64, u64) {
        let state = self.state.lock();
        (state.frames_captured, state.frames_released)
    }

    /// One driver per modality, all backed by this glove
    pub fn drivers(&self) -> SensorDrivers {
        SensorDrivers {
            flex: Some(Box::new(SimulatedFlex(self.clone()))),
            imu: Some(Box::new(SimulatedImu(self.clone()))),
            touch: Some(Box::new(SimulatedTouch(self.clone()))),
            camera: Some(Box::new(SimulatedCamera {
                glove: self.clone(),
                buffer: Vec::new(),
            })),
        }
    }
}

impl std::fmt::Debug for SimulatedGlove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedGlove")
            .field("pose", &self.pose())
            .finish()
    }
}

struct SimulatedFlex(SimulatedGlove);

impl FlexSensor for SimulatedFlex {
    fn read_angles(&mut self, _timeout: Duration) -> Result<FlexMeasurement> {
        let mut state = self.0.state.lock();
        state.take_failure(Modality::Flex)?;
        let angles = state.pose.angles;
        // 12-bit ADC spanning 0-90 degrees
        let raw = angles.map(|a| (a.clamp(0.0, 90.0) / 90.0 * 4095.0) as u16);
        Ok(FlexMeasurement {
            angles,
            raw: Some(raw),
        })
    }
}

struct SimulatedImu(SimulatedGlove);

impl InertialSensor for SimulatedImu {
    fn read(&mut self, _timeout: Duration) -> Result<ImuMeasurement> {
        let mut state = self.0.state.lock();
        state.take_failure(Modality::Inertial)?;
        let pose = state.pose;
        Ok(ImuMeasurement {
            accel: pose.accel,
            gyro: pose.gyro,
            orientation: pose.orientation,
            temperature: 31.5,
        })
    }
}

struct SimulatedTouch(SimulatedGlove);

impl TouchSensor for SimulatedTouch {
    fn read_status(&mut self, _timeout: Duration) -> Result<[bool; TOUCH_SENSOR_COUNT]> {
        let mut state = self.0.state.lock();
        state.take_failure(Modality::Touch)?;
        Ok(state.pose.touch)
    }

    fn attach_push(&mut self, handle: TouchPushHandle) -> Result<()> {
        self.0.state.lock().push = Some(handle);
        Ok(())
    }
}

struct SimulatedCamera {
    glove: SimulatedGlove,
    buffer: Vec<u8>,
}

impl CameraDriver for SimulatedCamera {
    fn capture_frame(&mut self, _timeout: Duration) -> Result<FrameView<'_>> {
        {
            let mut state = self.glove.state.lock();
            if state.frame_outstanding {
                return Err(Error::InvalidState(
                    "previous frame not released".to_string(),
                ));
            }
            state.take_failure(Modality::Camera)?;
            state.frames_captured += 1;
            state.frame_outstanding = true;

            // RGB565 gradient shifted by frame number
            let shift = state.frames_captured as u8;
            let len = usize::from(FRAME_WIDTH) * usize::from(FRAME_HEIGHT) * 2;
            self.buffer.clear();
            self.buffer
                .extend((0..len).map(|i| (i as u8).wrapping_add(shift)));
        }

        Ok(FrameView {
            bytes: &self.buffer,
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT,
            format: PixelFormat::Rgb565,
        })
    }

    fn release_frame(&mut self) {
        let mut state = self.glove.state.lock();
        if state.frame_outstanding {
            state.frame_outstanding = false;
            state.frames_released += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_lookup() {
        assert_eq!(HandPose::from_name("B"), Some(HandPose::flat()));
        assert_eq!(HandPose::from_name("fist"), Some(HandPose::fist()));
        assert!(HandPose::from_name("wave").is_none());
    }

    #[test]
    fn test_drivers_follow_pose() {
        let glove = SimulatedGlove::with_pose(HandPose::fist());
        let mut drivers = glove.drivers();
        let flex = drivers.flex.as_mut().unwrap();

        let reading = flex.read_angles(Duration::from_millis(5)).unwrap();
        assert_eq!(reading.angles[0], 30.0);
        assert_eq!(reading.raw.unwrap()[2], (70.0f32 / 90.0 * 4095.0) as u16);

        glove.set_pose(HandPose::flat().tilted(10.0, 0.0));
        let reading = flex.read_angles(Duration::from_millis(5)).unwrap();
        assert_eq!(reading.angles, [0.0; FLEX_JOINT_COUNT]);
        let imu = drivers.imu.as_mut().unwrap().read(Duration::ZERO).unwrap();
        assert_eq!(imu.orientation[0], 10.0);
    }

    #[test]
    fn test_injected_failures() {
        let glove = SimulatedGlove::new();
        let mut drivers = glove.drivers();
        glove.fail_reads(Modality::Inertial, 2);

        let imu = drivers.imu.as_mut().unwrap();
        assert!(imu.read(Duration::ZERO).is_err());
        assert!(imu.read(Duration::ZERO).is_err());
        assert!(imu.read(Duration::ZERO).is_ok());
    }

    #[test]
    fn test_camera_requires_release() {
        let glove = SimulatedGlove::new();
        let mut drivers = glove.drivers();
        let camera = drivers.camera.as_mut().unwrap();

        let len = camera.capture_frame(Duration::ZERO).unwrap().bytes.len();
        assert_eq!(len, 32 * 24 * 2);
        assert_eq!(glove.frames_outstanding(), 1);
        assert!(camera.capture_frame(Duration::ZERO).is_err());

        camera.release_frame();
        camera.release_frame();
        assert_eq!(glove.frame_counts(), (1, 1));
        assert!(camera.capture_frame(Duration::ZERO).is_ok());
    }

    #[test]
    fn test_press_without_handle() {
        let glove = SimulatedGlove::new();
        assert!(!glove.press([true; TOUCH_SENSOR_COUNT]));
        assert_eq!(glove.pose().touch, [true; TOUCH_SENSOR_COUNT]);
    }
}

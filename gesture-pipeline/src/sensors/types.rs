//! Core types for sensor sampling
//!
//! Defines the per-modality readings and the [`Sample`] that carries them
//! through the pipeline. Every modality is an `Option`: a missing or failed
//! reading is `None`, never a zero-filled placeholder.

use crate::time::clock::Timestamp;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Number of flex sensors (two joints per finger)
pub const FLEX_JOINT_COUNT: usize = 10;

/// Number of fingertip touch pads
pub const TOUCH_SENSOR_COUNT: usize = 5;

/// Largest physically meaningful joint bend angle (degrees)
pub const MAX_JOINT_ANGLE_DEG: f32 = 90.0;

/// Sensor modality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Modality {
    /// Finger-joint flex sensors
    Flex = 0,
    /// Accelerometer, gyroscope, and orientation
    Inertial = 1,
    /// Fingertip touch pads
    Touch = 2,
    /// Wrist camera
    Camera = 3,
}

impl Modality {
    /// All modalities in sampling order
    pub const ALL: [Modality; 4] = [
        Modality::Flex,
        Modality::Inertial,
        Modality::Touch,
        Modality::Camera,
    ];

    /// Short name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Flex => "flex",
            Modality::Inertial => "imu",
            Modality::Touch => "touch",
            Modality::Camera => "camera",
        }
    }

    /// Dense index for per-modality counters
    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Finger-joint bend angles
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlexReading {
    /// Bend angle per joint in degrees, `[0, 90]`.
    /// Order: thumb MCP, thumb PIP, index MCP, index PIP, ... pinky PIP.
    pub angles: [f32; FLEX_JOINT_COUNT],
    /// Raw ADC counts, when the driver exposes them
    pub raw: Option<[u16; FLEX_JOINT_COUNT]>,
    /// Acquisition time
    pub timestamp: Timestamp,
}

impl FlexReading {
    /// Create a reading, clamping every angle into `[0, 90]`.
    /// NaN angles are treated as fully straight.
    pub fn new(angles: [f32; FLEX_JOINT_COUNT], timestamp: Timestamp) -> Self {
        let mut clamped = angles;
        for angle in clamped.iter_mut() {
            *angle = if angle.is_nan() {
                0.0
            } else {
                angle.clamp(0.0, MAX_JOINT_ANGLE_DEG)
            };
        }
        Self {
            angles: clamped,
            raw: None,
            timestamp,
        }
    }

    /// Attach raw ADC counts
    pub fn with_raw(mut self, raw: [u16; FLEX_JOINT_COUNT]) -> Self {
        self.raw = Some(raw);
        self
    }
}

/// Inertial measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuReading {
    /// Acceleration in g (x, y, z)
    pub accel: [f32; 3],
    /// Angular rate in °/s (x, y, z)
    pub gyro: [f32; 3],
    /// Roll, pitch, yaw in degrees
    pub orientation: [f32; 3],
    /// Die temperature in °C
    pub temperature: f32,
    /// Acquisition time
    pub timestamp: Timestamp,
}

impl ImuReading {
    pub fn roll(&self) -> f32 {
        self.orientation[0]
    }

    pub fn pitch(&self) -> f32 {
        self.orientation[1]
    }

    pub fn yaw(&self) -> f32 {
        self.orientation[2]
    }

    /// Combined hand tilt, `|roll| + |pitch|` in degrees
    pub fn tilt_magnitude(&self) -> f32 {
        self.roll().abs() + self.pitch().abs()
    }
}

/// Fingertip contact state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchReading {
    /// One flag per fingertip, thumb first
    pub contacts: [bool; TOUCH_SENSOR_COUNT],
    /// Acquisition time
    pub timestamp: Timestamp,
}

impl TouchReading {
    pub fn new(contacts: [bool; TOUCH_SENSOR_COUNT], timestamp: Timestamp) -> Self {
        Self {
            contacts,
            timestamp,
        }
    }

    /// Check if any fingertip is touching
    pub fn any_active(&self) -> bool {
        self.contacts.iter().any(|&c| c)
    }

    /// Number of fingertips touching
    pub fn active_count(&self) -> usize {
        self.contacts.iter().filter(|&&c| c).count()
    }
}

/// Camera pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PixelFormat {
    #[default]
    Rgb565,
    Jpeg,
}

/// Uniquely owned image bytes.
///
/// Not `Clone`. Copies go through the fallible [`FramePayload::try_clone`],
/// which fails with `ResourceExhausted`. Dropping the payload releases it;
/// moving it transfers ownership.
pub struct FramePayload {
    bytes: Box<[u8]>,
}

impl FramePayload {
    /// Take ownership of an existing buffer (no copy).
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// Deep-copy `bytes` into a newly allocated payload.
    pub fn copy_from(bytes: &[u8]) -> Result<Self> {
        let mut owned = Vec::new();
        owned.try_reserve_exact(bytes.len()).map_err(|e| {
            Error::ResourceExhausted(format!("frame payload of {} bytes: {}", bytes.len(), e))
        })?;
        owned.extend_from_slice(bytes);
        Ok(Self::from_vec(owned))
    }

    /// Fallible deep copy
    pub fn try_clone(&self) -> Result<Self> {
        Self::copy_from(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for FramePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePayload")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Camera frame with its owned image data
#[derive(Debug)]
pub struct CameraFrame {
    pub width: u16,
    pub height: u16,
    pub format: PixelFormat,
    /// Acquisition time
    pub timestamp: Timestamp,
    /// Image bytes
    pub payload: FramePayload,
}

impl CameraFrame {
    /// Fallible deep copy, including the payload
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            width: self.width,
            height: self.height,
            format: self.format,
            timestamp: self.timestamp,
            payload: self.payload.try_clone()?,
        })
    }
}

/// One tick's worth of sensor data
///
/// Created once per tick by the sampler and moved downstream. Readings are
/// `Copy`; the camera frame, when present, is uniquely owned by the sample.
#[derive(Debug)]
pub struct Sample {
    /// Monotonic sequence number assigned by the sampler
    pub sequence: u64,
    /// Tick time
    pub timestamp: Timestamp,
    pub flex: Option<FlexReading>,
    pub imu: Option<ImuReading>,
    pub touch: Option<TouchReading>,
    pub camera: Option<CameraFrame>,
}

impl Sample {
    /// Create a sample with no valid modality
    pub fn new(sequence: u64, timestamp: Timestamp) -> Self {
        Self {
            sequence,
            timestamp,
            flex: None,
            imu: None,
            touch: None,
            camera: None,
        }
    }

    pub fn with_flex(mut self, flex: FlexReading) -> Self {
        self.flex = Some(flex);
        self
    }

    pub fn with_imu(mut self, imu: ImuReading) -> Self {
        self.imu = Some(imu);
        self
    }

    pub fn with_touch(mut self, touch: TouchReading) -> Self {
        self.touch = Some(touch);
        self
    }

    pub fn with_camera(mut self, camera: CameraFrame) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Check whether a modality carries a valid reading
    pub fn is_valid(&self, modality: Modality) -> bool {
        match modality {
            Modality::Flex => self.flex.is_some(),
            Modality::Inertial => self.imu.is_some(),
            Modality::Touch => self.touch.is_some(),
            Modality::Camera => self.camera.is_some(),
        }
    }

    /// Check if at least one modality is valid
    pub fn has_any_reading(&self) -> bool {
        Modality::ALL.iter().any(|m| self.is_valid(*m))
    }

    /// Modalities with a valid reading
    pub fn valid_modalities(&self) -> impl Iterator<Item = Modality> + '_ {
        Modality::ALL.into_iter().filter(move |m| self.is_valid(*m))
    }

    /// Copy of this sample without the camera payload
    pub fn detached(&self) -> Sample {
        Sample {
            sequence: self.sequence,
            timestamp: self.timestamp,
            flex: self.flex,
            imu: self.imu,
            touch: self.touch,
            camera: None,
        }
    }

    /// Fallible deep copy, including the camera payload
    pub fn try_clone(&self) -> Result<Sample> {
        let camera = match &self.camera {
            Some(frame) => Some(frame.try_clone()?),
            None => None,
        };
        Ok(Sample {
            camera,
            ..self.detached()
        })
    }

    /// Move the camera frame out of the sample
    pub fn take_camera(&mut self) -> Option<CameraFrame> {
        self.camera.take()
    }
}

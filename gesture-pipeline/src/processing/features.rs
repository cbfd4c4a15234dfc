//! Feature Extraction
//!
//! Pure transform from `(Sample, History)` to a fixed-layout
//! [`FeatureVector`]. Slots are filled progressively as modalities are
//! valid:
//!
//! | Slots | Content                                   | Requires            |
//! |-------|-------------------------------------------|---------------------|
//! | 0-9   | joint angles                              | flex                |
//! | 10-13 | adjacent MCP differences                  | flex                |
//! | 14-17 | adjacent PIP differences                  | flex                |
//! | 18-20 | roll, pitch, yaw                          | imu                 |
//! | 21-23 | accel x, y, z                             | imu                 |
//! | 24-26 | gyro x, y, z                              | imu                 |
//! | 27-31 | touch contacts (1.0 / 0.0)                | touch               |
//! | 32-34 | mean accel over recent history            | imu, history >= 5   |
//!
//! `feature_count` is one past the highest populated slot. Angles are
//! expected to be clamped upstream and are not re-clamped here.

use crate::pipeline::history::HistoryBuffer;
use crate::sensors::types::{Sample, FLEX_JOINT_COUNT, TOUCH_SENSOR_COUNT};
use crate::time::clock::Timestamp;
use crate::{Error, Result};

/// Number of float slots in a feature vector
pub const FEATURE_CAPACITY: usize = 100;

/// History entries averaged for the motion features
pub const MOTION_AVERAGE_WINDOW: usize = 5;

const ANGLE_SLOT: usize = 0;
const MCP_DIFF_SLOT: usize = 10;
const PIP_DIFF_SLOT: usize = 14;
const ORIENTATION_SLOT: usize = 18;
const ACCEL_SLOT: usize = 21;
const GYRO_SLOT: usize = 24;
const TOUCH_SLOT: usize = 27;
const MOTION_SLOT: usize = 32;

/// Fixed-capacity feature vector
///
/// Only the leading `feature_count` slots are meaningful, and the accessors
/// never expose anything beyond them.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f32; FEATURE_CAPACITY],
    feature_count: usize,
    /// Time of the sample the features were computed from
    pub timestamp: Timestamp,
    /// Sequence number of that sample
    pub sequence: u64,
}

impl FeatureVector {
    /// Empty vector (`feature_count == 0`)
    pub fn new(sequence: u64, timestamp: Timestamp) -> Self {
        Self {
            values: [0.0; FEATURE_CAPACITY],
            feature_count: 0,
            timestamp,
            sequence,
        }
    }

    /// Build a vector whose meaningful prefix is `values`
    pub fn from_slice(values: &[f32], timestamp: Timestamp) -> Result<Self> {
        if values.len() > FEATURE_CAPACITY {
            return Err(Error::InvalidArgument(format!(
                "{} features exceed capacity {}",
                values.len(),
                FEATURE_CAPACITY
            )));
        }
        let mut vector = Self::new(0, timestamp);
        vector.values[..values.len()].copy_from_slice(values);
        vector.feature_count = values.len();
        Ok(vector)
    }

    /// Meaningful features
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.values[..self.feature_count]
    }

    #[inline]
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.feature_count == 0
    }

    /// Feature at `slot`, `None` beyond `feature_count`
    #[inline]
    pub fn get(&self, slot: usize) -> Option<f32> {
        self.as_slice().get(slot).copied()
    }

    fn fill(&mut self, start: usize, values: &[f32]) {
        self.values[start..start + values.len()].copy_from_slice(values);
        self.feature_count = self.feature_count.max(start + values.len());
    }
}

/// Compute the feature vector for one tick
///
/// `history` is expected to already contain `sample`'s raw counterpart.
pub fn extract_features(sample: &Sample, history: &HistoryBuffer) -> FeatureVector {
    let mut features = FeatureVector::new(sample.sequence, sample.timestamp);

    if let Some(flex) = &sample.flex {
        let a = &flex.angles;
        features.fill(ANGLE_SLOT, a);

        // Differences between neighbouring fingers, same joint
        let mcp: [f32; 4] = std::array::from_fn(|i| (a[2 * i] - a[2 * i + 2]).abs());
        let pip: [f32; 4] = std::array::from_fn(|i| (a[2 * i + 1] - a[2 * i + 3]).abs());
        features.fill(MCP_DIFF_SLOT, &mcp);
        features.fill(PIP_DIFF_SLOT, &pip);
        debug_assert_eq!(features.feature_count, PIP_DIFF_SLOT + 4);
        debug_assert_eq!(a.len(), FLEX_JOINT_COUNT);
    }

    if let Some(imu) = &sample.imu {
        features.fill(ORIENTATION_SLOT, &imu.orientation);
        features.fill(ACCEL_SLOT, &imu.accel);
        features.fill(GYRO_SLOT, &imu.gyro);

        if history.len() >= MOTION_AVERAGE_WINDOW {
            if let Some(mean) = mean_recent_accel(history) {
                features.fill(MOTION_SLOT, &mean);
            }
        }
    }

    if let Some(touch) = &sample.touch {
        let contacts: [f32; TOUCH_SENSOR_COUNT] =
            std::array::from_fn(|i| if touch.contacts[i] { 1.0 } else { 0.0 });
        features.fill(TOUCH_SLOT, &contacts);
    }

    features
}

/// Mean acceleration over the newest history entries with a valid IMU reading
fn mean_recent_accel(history: &HistoryBuffer) -> Option<[f32; 3]> {
    let mut sum = [0.0f32; 3];
    let mut count = 0usize;

    for imu in history
        .iter_newest()
        .filter_map(|s| s.imu.as_ref())
        .take(MOTION_AVERAGE_WINDOW)
    {
        for (acc, value) in sum.iter_mut().zip(imu.accel) {
            *acc += value;
        }
        count += 1;
    }

    if count == 0 {
        return None;
    }
    Some(sum.map(|s| s / count as f32))
}

//! Sensor Fusion
//!
//! Combines the flex and inertial modalities into one corrected sample.
//! A tilted hand reads slightly higher bend on the flex strips, so joint
//! angles are scaled down by a factor derived from roll and pitch:
//!
//! ```text
//! factor = clamp(1 - (|roll| + |pitch|) / 180 * 0.1, 0.8, 1.0)
//! ```
//!
//! The factor is positive and at least 0.8, so the correction can never
//! flip the sign of an angle or remove more than a fifth of it.

use crate::sensors::types::{ImuReading, Sample};
use serde::Serialize;

/// Correction per 180° of combined tilt
pub const TILT_GAIN: f32 = 0.1;

/// Smallest factor ever applied to a joint angle
pub const MIN_TILT_FACTOR: f32 = 0.8;

/// Fusion counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FusionStats {
    /// Samples passed through the stage
    pub fused: u64,
    /// Samples whose joint angles were tilt-corrected
    pub corrected: u64,
}

/// Scale factor applied to joint angles for the given hand orientation
pub fn tilt_factor(imu: &ImuReading) -> f32 {
    let factor = 1.0 - imu.tilt_magnitude() / 180.0 * TILT_GAIN;
    if factor.is_finite() {
        factor.clamp(MIN_TILT_FACTOR, 1.0)
    } else {
        1.0
    }
}

/// Deterministic fusion stage
///
/// The only state is a diagnostic copy of the previous output.
#[derive(Debug, Default)]
pub struct FusionStage {
    last: Option<Sample>,
    stats: FusionStats,
}

impl FusionStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the corrected sample for this tick
    pub fn fuse(&mut self, mut sample: Sample) -> Sample {
        if let (Some(flex), Some(imu)) = (sample.flex.as_mut(), sample.imu.as_ref()) {
            let factor = tilt_factor(imu);
            for angle in flex.angles.iter_mut() {
                *angle *= factor;
            }
            self.stats.corrected += 1;
        }

        self.stats.fused += 1;
        self.last = Some(sample.detached());
        sample
    }

    /// Last fused sample, without its camera payload
    pub fn latest(&self) -> Option<&Sample> {
        self.last.as_ref()
    }

    pub fn stats(&self) -> FusionStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::types::{FlexReading, TouchReading};
    use crate::time::clock::Timestamp;

    fn imu(roll: f32, pitch: f32) -> ImuReading {
        ImuReading {
            accel: [0.0, 0.0, 1.0],
            gyro: [0.0; 3],
            orientation: [roll, pitch, 45.0],
            temperature: 25.0,
            timestamp: Timestamp::ZERO,
        }
    }

    fn flex(angle: f32) -> FlexReading {
        FlexReading::new([angle; 10], Timestamp::ZERO)
    }

    #[test]
    fn test_level_hand_is_unchanged() {
        let mut stage = FusionStage::new();
        let sample = Sample::new(0, Timestamp::ZERO)
            .with_flex(flex(60.0))
            .with_imu(imu(0.0, 0.0));

        let fused = stage.fuse(sample);
        assert_eq!(fused.flex.unwrap().angles, [60.0; 10]);
        assert_eq!(stage.stats().corrected, 1);
    }

    #[test]
    fn test_tilt_scales_angles() {
        let mut stage = FusionStage::new();
        // 45 + 45 = 90 degrees of tilt -> factor 0.95
        let sample = Sample::new(0, Timestamp::ZERO)
            .with_flex(flex(80.0))
            .with_imu(imu(45.0, -45.0));

        let fused = stage.fuse(sample);
        for angle in fused.flex.unwrap().angles {
            assert!((angle - 76.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_factor_is_bounded() {
        assert_eq!(tilt_factor(&imu(180.0, 180.0)), MIN_TILT_FACTOR);
        assert_eq!(tilt_factor(&imu(720.0, 720.0)), MIN_TILT_FACTOR);
        assert_eq!(tilt_factor(&imu(f32::NAN, 0.0)), 1.0);
        assert!(tilt_factor(&imu(10.0, 5.0)) <= 1.0);
    }

    #[test]
    fn test_flex_without_imu_passes_through() {
        let mut stage = FusionStage::new();
        let sample = Sample::new(3, Timestamp::ZERO).with_flex(flex(30.0));

        let fused = stage.fuse(sample);
        assert_eq!(fused.flex.unwrap().angles, [30.0; 10]);
        assert_eq!(stage.stats().fused, 1);
        assert_eq!(stage.stats().corrected, 0);
    }

    #[test]
    fn test_other_modalities_untouched() {
        let mut stage = FusionStage::new();
        let touch = TouchReading::new([true, false, true, false, false], Timestamp::ZERO);
        let reading = imu(30.0, 30.0);
        let sample = Sample::new(1, Timestamp::ZERO)
            .with_flex(flex(50.0))
            .with_imu(reading)
            .with_touch(touch);

        let fused = stage.fuse(sample);
        assert_eq!(fused.imu, Some(reading));
        assert_eq!(fused.touch, Some(touch));
    }

    #[test]
    fn test_latest_is_detached_copy() {
        let mut stage = FusionStage::new();
        assert!(stage.latest().is_none());

        stage.fuse(Sample::new(7, Timestamp::from_millis(70)).with_flex(flex(10.0)));
        let last = stage.latest().unwrap();
        assert_eq!(last.sequence, 7);
        assert!(last.camera.is_none());
    }
}

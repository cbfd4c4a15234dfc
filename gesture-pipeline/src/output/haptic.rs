//! Haptic Confirmation

use super::ResultSink;
use crate::recognition::RecognitionResult;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Vibration motor collaborator
pub trait HapticActuator: Send {
    /// Vibrate at `intensity` percent for `duration`
    fn pulse(&mut self, intensity: u8, duration: Duration) -> Result<()>;
}

/// Pulses once per accepted gesture
pub struct HapticFeedback {
    actuator: Box<dyn HapticActuator>,
    intensity: u8,
    duration: Duration,
}

impl HapticFeedback {
    pub fn new(actuator: Box<dyn HapticActuator>, intensity: u8, duration: Duration) -> Result<Self> {
        if intensity > 100 {
            return Err(Error::InvalidArgument(format!(
                "haptic intensity {} exceeds 100",
                intensity
            )));
        }
        Ok(Self {
            actuator,
            intensity,
            duration,
        })
    }
}

impl ResultSink for HapticFeedback {
    fn name(&self) -> &str {
        "haptic"
    }

    fn handle(&mut self, _result: &RecognitionResult) -> Result<()> {
        self.actuator.pulse(self.intensity, self.duration)
    }
}

/// Actuator that only counts pulses; clones share the count
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    pulses: Arc<AtomicU64>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulses(&self) -> u64 {
        self.pulses.load(Ordering::Relaxed)
    }
}

impl HapticActuator for RecordingActuator {
    fn pulse(&mut self, _intensity: u8, _duration: Duration) -> Result<()> {
        self.pulses.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::clock::Timestamp;

    #[test]
    fn test_pulse_per_result() {
        let actuator = RecordingActuator::new();
        let mut haptic =
            HapticFeedback::new(Box::new(actuator.clone()), 80, Duration::from_millis(100)).unwrap();
        let result = RecognitionResult {
            gesture_id: 0,
            name: "A".to_string(),
            confidence: 1.0,
            is_dynamic: false,
            duration_ms: 0,
            timestamp: Timestamp::ZERO,
            sequence: 0,
        };
        haptic.handle(&result).unwrap();
        haptic.handle(&result).unwrap();
        assert_eq!(actuator.pulses(), 2);
    }

    #[test]
    fn test_intensity_bound() {
        assert!(HapticFeedback::new(Box::new(RecordingActuator::new()), 101, Duration::ZERO).is_err());
    }
}

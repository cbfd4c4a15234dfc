//! Result Output
//!
//! - `dispatcher`: Copies each accepted result into every output route
//! - `worker`: Drains a route and feeds the configured sinks
//! - `text`: Sentence accumulation with control tokens
//! - `notify`: Wireless gesture notifications
//! - `haptic`: Confirmation pulses

pub mod dispatcher;
pub mod haptic;
pub mod notify;
pub mod text;
pub mod worker;

pub use dispatcher::{DispatchStats, Dispatcher};
pub use haptic::{HapticActuator, HapticFeedback, RecordingActuator};
pub use notify::{encode_gesture, GestureNotification, GestureNotifier, RecordingLink, WirelessLink};
pub use text::{TextAccumulator, TextView};
pub use worker::{OutputStats, OutputWorker};

use crate::recognition::RecognitionResult;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Downstream consumer of accepted gestures
pub trait ResultSink: Send {
    fn name(&self) -> &str;

    fn handle(&mut self, result: &RecognitionResult) -> Result<()>;
}

/// Which sinks receive results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    #[default]
    TextOnly,
    NotifyOnly,
    TextAndNotify,
    /// Haptic confirmation only
    Minimal,
}

impl OutputMode {
    pub fn wants_text(&self) -> bool {
        matches!(self, OutputMode::TextOnly | OutputMode::TextAndNotify)
    }

    pub fn wants_notify(&self) -> bool {
        matches!(self, OutputMode::NotifyOnly | OutputMode::TextAndNotify)
    }

    /// Minimal mode always pulses; other modes only when intensity is set
    pub fn wants_haptic(&self, intensity: u8) -> bool {
        match self {
            OutputMode::Minimal => true,
            _ => intensity > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_routing() {
        assert!(OutputMode::TextOnly.wants_text());
        assert!(!OutputMode::TextOnly.wants_notify());
        assert!(OutputMode::TextAndNotify.wants_text() && OutputMode::TextAndNotify.wants_notify());
        assert!(!OutputMode::Minimal.wants_text());
        assert!(OutputMode::Minimal.wants_haptic(0));
        assert!(!OutputMode::NotifyOnly.wants_haptic(0));
        assert!(OutputMode::NotifyOnly.wants_haptic(80));
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&OutputMode::TextAndNotify).unwrap();
        assert_eq!(json, "\"text_and_notify\"");
    }
}

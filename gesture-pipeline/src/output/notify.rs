//! Gesture Notifications
//!
//! Encodes accepted gestures for a wireless link. Frame layout:
//!
//! ```text
//! [id: u8][name_len: u8][name: name_len bytes, <= 32][confidence: f32 LE]
//! ```

use super::ResultSink;
use crate::recognition::templates::MAX_GESTURE_NAME_LEN;
use crate::recognition::RecognitionResult;
use crate::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Transport for encoded notifications
pub trait WirelessLink: Send {
    /// Whether a peer is listening; frames are skipped otherwise
    fn is_connected(&self) -> bool {
        true
    }

    fn send(&mut self, frame: &[u8]) -> Result<()>;
}

/// Notification payload, also used for structured logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureNotification {
    pub id: u8,
    pub name: String,
    pub confidence: f32,
}

impl From<&RecognitionResult> for GestureNotification {
    fn from(result: &RecognitionResult) -> Self {
        Self {
            id: result.gesture_id,
            name: result.name.clone(),
            confidence: result.confidence,
        }
    }
}

/// Encode a notification frame. Names longer than 32 bytes are cut at the
/// last character boundary that fits.
pub fn encode_gesture(notification: &GestureNotification) -> Vec<u8> {
    let mut end = notification.name.len().min(MAX_GESTURE_NAME_LEN);
    while !notification.name.is_char_boundary(end) {
        end -= 1;
    }
    let name = &notification.name.as_bytes()[..end];

    let mut frame = Vec::with_capacity(2 + name.len() + 4);
    frame.push(notification.id);
    frame.push(name.len() as u8);
    frame.extend_from_slice(name);
    frame.extend_from_slice(&notification.confidence.to_le_bytes());
    frame
}

pub struct GestureNotifier {
    link: Box<dyn WirelessLink>,
    skipped: u64,
}

impl GestureNotifier {
    pub fn new(link: Box<dyn WirelessLink>) -> Self {
        Self { link, skipped: 0 }
    }

    /// Notifications not sent because the link was disconnected
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl ResultSink for GestureNotifier {
    fn name(&self) -> &str {
        "notify"
    }

    fn handle(&mut self, result: &RecognitionResult) -> Result<()> {
        if !self.link.is_connected() {
            self.skipped += 1;
            return Ok(());
        }
        let notification = GestureNotification::from(result);
        let json = serde_json::to_string(&notification)?;
        debug!(notification = %json, "Sending gesture notification");
        self.link.send(&encode_gesture(&notification))
    }
}

/// Link that keeps every frame in memory; clones share the frames
#[derive(Debug, Clone, Default)]
pub struct RecordingLink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().clone()
    }
}

impl WirelessLink for RecordingLink {
    fn send(&mut self, frame: &[u8]) -> Result<()> {
        self.frames.lock().push(frame.to_vec());
        Ok(())
    }
}

//! Debounce State
//!
//! Suppresses a held gesture from re-firing every tick. A candidate whose
//! name equals the last accepted one is ignored until the debounce window
//! has elapsed since that acceptance.
//!
//! Phases per tick:
//!
//! ```text
//! Idle --(candidate >= threshold)--> CandidateSeen
//! CandidateSeen --(window elapsed or new name)--> Accepted
//! Accepted --(next tick)--> Idle
//! ```
//!
//! The state also tracks how long the current candidate has been seen
//! without interruption, which becomes the reported gesture duration.

use super::MAX_GESTURE_DURATION_MS;
use crate::time::clock::Timestamp;
use std::time::Duration;

/// Default debounce window
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebouncePhase {
    Idle,
    CandidateSeen,
    Accepted,
}

/// Private to one classifier; never shared across threads
#[derive(Debug, Clone)]
pub struct DebounceState {
    window: Duration,
    phase: DebouncePhase,
    last_accepted: Option<(String, Timestamp)>,
    /// Current candidate and when its unbroken run began
    run: Option<(String, Timestamp)>,
}

impl DebounceState {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            phase: DebouncePhase::Idle,
            last_accepted: None,
            run: None,
        }
    }

    /// Feed this tick's qualifying candidate, if any.
    ///
    /// Returns the held duration (ms) when the candidate is accepted, `None`
    /// when there is no candidate or it is suppressed.
    pub fn observe(&mut self, candidate: Option<&str>, now: Timestamp) -> Option<u64> {
        if self.phase == DebouncePhase::Accepted {
            self.phase = DebouncePhase::Idle;
        }

        let Some(name) = candidate else {
            self.run = None;
            self.phase = DebouncePhase::Idle;
            return None;
        };

        let run_start = match &self.run {
            Some((current, since)) if current == name => *since,
            _ => {
                self.run = Some((name.to_string(), now));
                now
            }
        };
        self.phase = DebouncePhase::CandidateSeen;

        if self.is_suppressed(name, now) {
            return None;
        }

        self.last_accepted = Some((name.to_string(), now));
        self.phase = DebouncePhase::Accepted;

        let held = u64::try_from(now.duration_since(run_start).as_millis()).unwrap_or(u64::MAX);
        Some(held.min(MAX_GESTURE_DURATION_MS))
    }

    /// Check whether accepting `name` now would be a repeat inside the window
    pub fn is_suppressed(&self, name: &str, now: Timestamp) -> bool {
        match &self.last_accepted {
            Some((last, at)) => last == name && now.duration_since(*at) < self.window,
            None => false,
        }
    }

    pub fn phase(&self) -> DebouncePhase {
        self.phase
    }

    /// Last accepted gesture name and acceptance time
    pub fn last_accepted(&self) -> Option<(&str, Timestamp)> {
        self.last_accepted
            .as_ref()
            .map(|(name, at)| (name.as_str(), *at))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    /// Forget all history
    pub fn reset(&mut self) {
        self.phase = DebouncePhase::Idle;
        self.last_accepted = None;
        self.run = None;
    }
}

impl Default for DebounceState {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}

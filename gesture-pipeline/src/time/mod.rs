//! Millisecond timing for the sensor pipeline
//!
//! This module provides the pipeline's only notion of "now":
//! - Monotonic (never goes backward)
//! - Millisecond resolution, matching sensor tick granularity
//! - Injectable, so tests can drive due-time and debounce logic by hand

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};

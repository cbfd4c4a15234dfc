//! Sample History Ring
//!
//! Fixed-capacity FIFO of recent samples used for temporal features.
//!
//! Ownership rules for camera payloads:
//! - `push` stores a deep copy; the ring never aliases the producer's buffer
//! - a copy that cannot be allocated (or would exceed the payload budget)
//!   is dropped and the stored sample's camera modality becomes invalid;
//!   the push itself still succeeds
//! - evicting the oldest sample releases its payload before the slot is
//!   overwritten
//! - `pop` moves the sample, payload included, out to the caller and leaves
//!   the slot empty, so a payload can only ever be released once

use crate::sensors::types::{CameraFrame, Sample};
use crate::{Error, Result};
use serde::Serialize;
use tracing::warn;

/// Default history depth (samples)
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Ring statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    /// Samples stored
    pub pushed: u64,
    /// Samples overwritten because the ring was full
    pub evicted: u64,
    /// Samples moved out by `pop`
    pub popped: u64,
    /// Camera payloads that could not be copied
    pub payload_copy_failures: u64,
}

/// Fixed-capacity sample ring with FIFO eviction
pub struct HistoryBuffer {
    slots: Vec<Option<Sample>>,
    /// Next slot to write
    head: usize,
    /// Oldest occupied slot
    tail: usize,
    len: usize,
    /// Maximum bytes of camera payload held at once
    payload_budget: usize,
    /// Camera payload bytes currently held
    payload_bytes: usize,
    stats: HistoryStats,
}

impl HistoryBuffer {
    /// Create a ring with no payload budget limit
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_payload_budget(capacity, usize::MAX)
    }

    /// Create a ring that holds at most `budget_bytes` of camera payload.
    ///
    /// Copies that would exceed the budget fail like an allocation failure.
    pub fn with_payload_budget(capacity: usize, budget_bytes: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArgument(
                "history capacity must be > 0".to_string(),
            ));
        }

        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity).map_err(|e| {
            Error::ResourceExhausted(format!("history of {} samples: {}", capacity, e))
        })?;
        slots.resize_with(capacity, || None);

        Ok(Self {
            slots,
            head: 0,
            tail: 0,
            len: 0,
            payload_budget: budget_bytes,
            payload_bytes: 0,
            stats: HistoryStats::default(),
        })
    }

    /// Store a copy of `sample`, evicting the oldest entry if full.
    ///
    /// Never fails. A camera payload that cannot be copied is left out of the
    /// stored copy.
    pub fn push(&mut self, sample: &Sample) {
        if self.is_full() {
            // Release the oldest payload before its slot is reused
            if let Some(evicted) = self.slots[self.tail].take() {
                self.release(evicted);
            }
            self.tail = (self.tail + 1) % self.capacity();
            self.len -= 1;
            self.stats.evicted += 1;
        }

        let mut stored = sample.detached();
        if let Some(frame) = &sample.camera {
            match self.copy_payload(frame) {
                Ok(copy) => stored.camera = Some(copy),
                Err(e) => {
                    warn!(sequence = sample.sequence, error = %e, "Camera payload not retained in history");
                    self.stats.payload_copy_failures += 1;
                }
            }
        }

        self.slots[self.head] = Some(stored);
        self.head = (self.head + 1) % self.capacity();
        self.len += 1;
        self.stats.pushed += 1;
    }

    /// Move the oldest sample out, payload included.
    pub fn pop(&mut self) -> Result<Sample> {
        if self.is_empty() {
            return Err(Error::NotFound("history is empty".to_string()));
        }

        let sample = self.slots[self.tail].take().ok_or_else(|| {
            Error::InvalidState(format!("history slot {} unexpectedly empty", self.tail))
        })?;
        if let Some(frame) = &sample.camera {
            self.payload_bytes -= frame.payload.len();
        }

        self.tail = (self.tail + 1) % self.capacity();
        self.len -= 1;
        self.stats.popped += 1;
        Ok(sample)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Number of stored samples
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Most recently pushed sample
    pub fn latest(&self) -> Option<&Sample> {
        self.iter_newest().next()
    }

    /// Iterate stored samples from newest to oldest
    pub fn iter_newest(&self) -> impl Iterator<Item = &Sample> + '_ {
        let capacity = self.capacity();
        (0..self.len).filter_map(move |age| {
            let index = (self.head + capacity - 1 - age) % capacity;
            self.slots[index].as_ref()
        })
    }

    /// Drop every stored sample, releasing all payloads
    pub fn clear(&mut self) {
        while let Ok(sample) = self.pop() {
            drop(sample);
        }
        self.head = 0;
        self.tail = 0;
    }

    /// Camera payload bytes currently held
    pub fn payload_bytes(&self) -> usize {
        self.payload_bytes
    }

    pub fn stats(&self) -> HistoryStats {
        self.stats
    }

    fn copy_payload(&mut self, frame: &CameraFrame) -> Result<CameraFrame> {
        let needed = frame.payload.len();
        if self.payload_bytes.saturating_add(needed) > self.payload_budget {
            return Err(Error::ResourceExhausted(format!(
                "payload budget of {} bytes exceeded ({} held, {} requested)",
                self.payload_budget, self.payload_bytes, needed
            )));
        }
        let copy = frame.try_clone()?;
        self.payload_bytes += needed;
        Ok(copy)
    }

    fn release(&mut self, sample: Sample) {
        if let Some(frame) = &sample.camera {
            self.payload_bytes -= frame.payload.len();
        }
        drop(sample);
    }
}

impl std::fmt::Debug for HistoryBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryBuffer")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("payload_bytes", &self.payload_bytes)
            .finish()
    }
}

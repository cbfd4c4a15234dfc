//! Processing Stage
//!
//! One step per received sample:
//!
//! ```text
//! sample ─┬─▶ history.push (raw copy)
//!         └─▶ fusion ─▶ features(fused, history) ─▶ classifier ─▶ dispatcher
//! ```
//!
//! Classifier errors never stop the stage. They are logged on the first
//! occurrence and then every [`ERROR_LOG_INTERVAL`] occurrences so that a
//! persistent condition (such as an empty vocabulary) stays visible without
//! flooding the log.

use super::channel::Receiver;
use super::history::HistoryBuffer;
use crate::output::dispatcher::Dispatcher;
use crate::processing::features::extract_features;
use crate::processing::fusion::FusionStage;
use crate::recognition::{GestureClassifier, RecognitionResult};
use crate::sensors::types::Sample;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Log every Nth repeated classifier error
pub const ERROR_LOG_INTERVAL: u64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    /// Samples processed
    pub processed: u64,
    /// Results accepted by the classifier
    pub recognized: u64,
    /// Classifier calls that returned an error
    pub classifier_errors: u64,
    /// Gaps in the incoming sequence numbers (samples lost upstream)
    pub sequence_gaps: u64,
}

pub struct ProcessingStage {
    history: HistoryBuffer,
    fusion: FusionStage,
    classifier: Box<dyn GestureClassifier>,
    dispatcher: Dispatcher,
    last_sequence: Option<u64>,
    stats: StageStats,
}

impl ProcessingStage {
    pub fn new(
        history: HistoryBuffer,
        classifier: Box<dyn GestureClassifier>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            history,
            fusion: FusionStage::new(),
            classifier,
            dispatcher,
            last_sequence: None,
            stats: StageStats::default(),
        }
    }

    /// Process one sample; returns the accepted result, if any, after it
    /// has been dispatched.
    pub fn process(&mut self, sample: Sample) -> Option<RecognitionResult> {
        self.track_sequence(sample.sequence);
        self.stats.processed += 1;

        self.history.push(&sample);
        let fused = self.fusion.fuse(sample);
        let features = extract_features(&fused, &self.history);

        match self.classifier.classify(&features) {
            Ok(Some(result)) => {
                self.stats.recognized += 1;
                self.dispatcher.dispatch(result.clone());
                Some(result)
            }
            Ok(None) => None,
            Err(e) => {
                self.stats.classifier_errors += 1;
                let count = self.stats.classifier_errors;
                if count == 1 || count % ERROR_LOG_INTERVAL == 0 {
                    warn!(
                        classifier = self.classifier.name(),
                        error = %e,
                        occurrences = count,
                        "Classification failed"
                    );
                }
                None
            }
        }
    }

    /// Receive and process samples until `stop` is set or the sampler goes away
    pub fn run(
        &mut self,
        receiver: &mut Receiver<Sample>,
        recv_timeout: Duration,
        stop: &AtomicBool,
    ) -> StageStats {
        info!(classifier = self.classifier.name(), "Processing stage started");

        while !stop.load(Ordering::Relaxed) {
            match receiver.recv_timeout(recv_timeout) {
                Some(sample) => {
                    self.process(sample);
                }
                None if receiver.is_abandoned() => break,
                None => {
                    debug!(
                        channel = receiver.name(),
                        stats = ?receiver.stats().snapshot(),
                        history = self.history.len(),
                        "No sample within receive timeout"
                    );
                }
            }
        }

        info!(
            processed = self.stats.processed,
            recognized = self.stats.recognized,
            "Processing stage stopped"
        );
        self.stats
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn fusion(&self) -> &FusionStage {
        &self.fusion
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn stats(&self) -> StageStats {
        self.stats
    }

    fn track_sequence(&mut self, sequence: u64) {
        if let Some(last) = self.last_sequence {
            if sequence > last + 1 {
                self.stats.sequence_gaps += 1;
                debug!(expected = last + 1, got = sequence, "Sample sequence gap");
            }
        }
        self.last_sequence = Some(sequence);
    }
}

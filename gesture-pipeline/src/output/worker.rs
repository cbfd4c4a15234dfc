//! Output Worker
//!
//! Consumer loop for one dispatch route. Each result is offered to every
//! sink in order; a failing sink is logged and does not stop the others.

use super::ResultSink;
use crate::pipeline::channel::Receiver;
use crate::recognition::RecognitionResult;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutputStats {
    /// Results taken from the route
    pub handled: u64,
    /// Sink calls that returned an error
    pub sink_errors: u64,
}

pub struct OutputWorker {
    receiver: Receiver<RecognitionResult>,
    sinks: Vec<Box<dyn ResultSink>>,
    recv_timeout: Duration,
    stats: OutputStats,
}

impl OutputWorker {
    pub fn new(receiver: Receiver<RecognitionResult>, recv_timeout: Duration) -> Self {
        Self {
            receiver,
            sinks: Vec::new(),
            recv_timeout,
            stats: OutputStats::default(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Feed one result to every sink
    pub fn process(&mut self, result: &RecognitionResult) {
        self.stats.handled += 1;
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.handle(result) {
                self.stats.sink_errors += 1;
                warn!(sink = sink.name(), gesture = %result.name, error = %e, "Output sink failed");
            }
        }
    }

    /// Process results until `stop` is set or the route is abandoned,
    /// then drain whatever is still queued.
    pub fn run(&mut self, stop: &AtomicBool) -> OutputStats {
        info!(sinks = ?self.sink_names(), "Output worker started");

        while !stop.load(Ordering::Relaxed) {
            match self.receiver.recv_timeout(self.recv_timeout) {
                Some(result) => self.process(&result),
                None if self.receiver.is_abandoned() => break,
                None => {
                    debug!(channel = self.receiver.name(), stats = ?self.receiver.stats().snapshot(), "Output idle");
                }
            }
        }

        while let Some(result) = self.receiver.try_recv() {
            self.process(&result);
        }

        info!(handled = self.stats.handled, "Output worker stopped");
        self.stats
    }

    pub fn stats(&self) -> OutputStats {
        self.stats
    }
}

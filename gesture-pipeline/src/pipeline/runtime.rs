//! Pipeline Runtime
//!
//! Wires drivers, channels, and stages together and runs them on three
//! named threads:
//!
//! ```text
//! glove-sampler ──[sensor]──▶ glove-processing ──[results]──▶ glove-output
//!                                     │
//!                                     └──[taps]──▶ caller-owned receivers
//! ```
//!
//! Every channel is created here and moved into the threads it connects.
//! Shutdown is cooperative: each loop checks a shared stop flag at its
//! receive or idle point and returns its statistics when joined.

use super::channel::{self, ChannelSnapshot, ChannelStats, Receiver, Sender};
use super::history::HistoryBuffer;
use super::stage::{ProcessingStage, StageStats};
use crate::app::config::{ClassifierBackend, Config};
use crate::output::haptic::{HapticActuator, HapticFeedback};
use crate::output::notify::{GestureNotifier, WirelessLink};
use crate::output::text::{TextAccumulator, TextView};
use crate::output::worker::{OutputStats, OutputWorker};
use crate::output::{Dispatcher, OutputMode};
use crate::recognition::{
    GestureClassifier, ModelClassifier, RecognitionResult, TemplateClassifier, Vocabulary,
};
use crate::sensors::drivers::SensorDrivers;
use crate::sensors::sampler::{Sampler, SamplerCounters, SamplerStats};
use crate::sensors::types::Sample;
use crate::time::clock::{Clock, MonotonicClock};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

/// Statistics readable while the pipeline runs
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LiveStats {
    pub sampler: SamplerStats,
    pub sensor_channel: ChannelSnapshot,
    pub result_channel: ChannelSnapshot,
}

/// Final statistics returned by [`PipelineHandle::join`]
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PipelineStats {
    pub sampler: SamplerStats,
    pub processing: StageStats,
    pub output: OutputStats,
    pub sensor_channel: ChannelSnapshot,
    pub result_channel: ChannelSnapshot,
}

/// Build the classifier selected by the configuration
pub fn build_classifier(config: &Config) -> Result<Box<dyn GestureClassifier>> {
    let settings = &config.classifier;
    let debounce = Duration::from_millis(settings.debounce_window_ms);

    match settings.backend {
        ClassifierBackend::Template => {
            let vocabulary = match &settings.vocabulary_path {
                Some(path) => Vocabulary::load(path)?,
                None => Vocabulary::builtin(),
            };
            let classifier = TemplateClassifier::new(vocabulary)
                .with_threshold(settings.confidence_threshold)?
                .with_debounce_window(debounce)?;
            Ok(Box::new(classifier))
        }
        ClassifierBackend::Model => {
            let path = settings.model_path.as_ref().ok_or_else(|| {
                Error::Config("model backend requires model_path".to_string())
            })?;
            let mut classifier = ModelClassifier::load(path)?
                .with_lock_timeout(Duration::from_millis(settings.lock_timeout_ms))?
                .with_debounce_window(debounce)?;
            classifier.set_kind_thresholds(
                settings.confidence_threshold,
                settings.dynamic_confidence_threshold,
            )?;
            Ok(Box::new(classifier))
        }
    }
}

/// Assembles and starts a pipeline
pub struct PipelineBuilder {
    config: Config,
    drivers: SensorDrivers,
    clock: Arc<dyn Clock>,
    classifier: Option<Box<dyn GestureClassifier>>,
    text: Option<TextAccumulator>,
    link: Option<Box<dyn WirelessLink>>,
    actuator: Option<Box<dyn HapticActuator>>,
    taps: Vec<Sender<RecognitionResult>>,
}

impl PipelineBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            drivers: SensorDrivers::default(),
            clock: Arc::new(MonotonicClock::new()),
            classifier: None,
            text: None,
            link: None,
            actuator: None,
            taps: Vec::new(),
        }
    }

    pub fn with_drivers(mut self, drivers: SensorDrivers) -> Self {
        self.drivers = drivers;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use this classifier instead of the configured backend
    pub fn with_classifier(mut self, classifier: Box<dyn GestureClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_text_accumulator(mut self, text: TextAccumulator) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_wireless_link(mut self, link: Box<dyn WirelessLink>) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_haptic_actuator(mut self, actuator: Box<dyn HapticActuator>) -> Self {
        self.actuator = Some(actuator);
        self
    }

    /// Add an extra dispatch route and return its receiving end
    pub fn add_result_tap(&mut self, capacity: usize) -> Result<Receiver<RecognitionResult>> {
        let (tx, rx) = channel::bounded("result-tap", capacity)?;
        self.taps.push(tx);
        Ok(rx)
    }

    /// Validate the configuration, build every stage, and start the threads
    pub fn spawn(self) -> Result<PipelineHandle> {
        let Self {
            config,
            drivers,
            clock,
            classifier,
            text,
            link,
            actuator,
            taps,
        } = self;
        config.validate()?;

        let recv_timeout = Duration::from_millis(config.pipeline.recv_timeout_ms);
        let (sensor_tx, mut sensor_rx) =
            channel::bounded::<Sample>("sensor", config.pipeline.sensor_queue_capacity)?;
        let (result_tx, result_rx) =
            channel::bounded("results", config.pipeline.result_queue_capacity)?;
        let sensor_stats = sensor_tx.stats();
        let result_stats = result_tx.stats();

        let classifier = match classifier {
            Some(classifier) => classifier,
            None => build_classifier(&config)?,
        };

        let mut dispatcher = Dispatcher::new();
        dispatcher.add_route(result_tx);
        for tap in taps {
            dispatcher.add_route(tap);
        }

        let history = HistoryBuffer::new(config.pipeline.history_capacity)?;
        let mut stage = ProcessingStage::new(history, classifier, dispatcher);

        let (mut worker, text_view) =
            build_output_worker(&config, result_rx, recv_timeout, text, link, actuator)?;

        let mut sampler = Sampler::new(drivers, config.sampler.schedule(), clock, sensor_tx)?;
        let sampler_counters = sampler.counters();

        let stop = Arc::new(AtomicBool::new(false));
        let mut handle = PipelineHandle {
            stop: Arc::clone(&stop),
            sampler: None,
            processing: None,
            output: None,
            sampler_counters,
            sensor_stats,
            result_stats,
            text: text_view,
        };

        // Consumers first, so nothing is produced without a reader
        let flag = Arc::clone(&stop);
        handle.output = Some(spawn_named("glove-output", move || worker.run(&flag))?);

        let flag = Arc::clone(&stop);
        handle.processing = Some(spawn_named("glove-processing", move || {
            stage.run(&mut sensor_rx, recv_timeout, &flag)
        })?);

        let flag = Arc::clone(&stop);
        handle.sampler = Some(spawn_named("glove-sampler", move || sampler.run(&flag))?);

        info!(
            history = config.pipeline.history_capacity,
            mode = ?config.output.mode,
            "Pipeline started"
        );
        Ok(handle)
    }
}

fn spawn_named<T, F>(name: &str, body: F) -> Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(Error::Io)
}

fn build_output_worker(
    config: &Config,
    receiver: Receiver<RecognitionResult>,
    recv_timeout: Duration,
    text: Option<TextAccumulator>,
    link: Option<Box<dyn WirelessLink>>,
    actuator: Option<Box<dyn HapticActuator>>,
) -> Result<(OutputWorker, Option<TextView>)> {
    let output = &config.output;
    let mut worker = OutputWorker::new(receiver, recv_timeout);
    let mut text_view = None;

    if output.mode.wants_text() {
        let text = text.unwrap_or_default();
        text_view = Some(text.view());
        worker = worker.with_sink(Box::new(text));
    }

    if output.mode.wants_notify() {
        let link = link.ok_or_else(|| {
            Error::InvalidArgument(format!("output mode {:?} requires a wireless link", output.mode))
        })?;
        worker = worker.with_sink(Box::new(GestureNotifier::new(link)));
    }

    if output.mode.wants_haptic(output.haptic_intensity) {
        match actuator {
            Some(actuator) => {
                let haptic = HapticFeedback::new(
                    actuator,
                    output.haptic_intensity,
                    Duration::from_millis(output.haptic_duration_ms),
                )?;
                worker = worker.with_sink(Box::new(haptic));
            }
            None if output.mode == OutputMode::Minimal => {
                return Err(Error::InvalidArgument(
                    "minimal output mode requires a haptic actuator".to_string(),
                ));
            }
            None => debug!("No haptic actuator; confirmation pulses disabled"),
        }
    }

    Ok((worker, text_view))
}

/// Running pipeline
pub struct PipelineHandle {
    stop: Arc<AtomicBool>,
    sampler: Option<JoinHandle<SamplerStats>>,
    processing: Option<JoinHandle<StageStats>>,
    output: Option<JoinHandle<OutputStats>>,
    sampler_counters: Arc<SamplerCounters>,
    sensor_stats: Arc<ChannelStats>,
    result_stats: Arc<ChannelStats>,
    text: Option<TextView>,
}

impl PipelineHandle {
    /// Ask every thread to stop at its next check
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Shared stop flag, e.g. for a Ctrl+C handler
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> LiveStats {
        LiveStats {
            sampler: self.sampler_counters.snapshot(),
            sensor_channel: self.sensor_stats.snapshot(),
            result_channel: self.result_stats.snapshot(),
        }
    }

    /// Current accumulated sentence, when a text sink is active
    pub fn text(&self) -> Option<String> {
        self.text.as_ref().map(|view| view.text())
    }

    /// Wait for every thread to finish
    pub fn join(mut self) -> Result<PipelineStats> {
        // Producer first so downstream loops see the abandoned channel
        let sampler = join_stage("sampler", self.sampler.take())?;
        let processing = join_stage("processing", self.processing.take())?;
        let output = join_stage("output", self.output.take())?;

        Ok(PipelineStats {
            sampler,
            processing,
            output,
            sensor_channel: self.sensor_stats.snapshot(),
            result_channel: self.result_stats.snapshot(),
        })
    }

    /// Stop and join
    pub fn shutdown(self) -> Result<PipelineStats> {
        self.stop();
        self.join()
    }
}

fn join_stage<T: Default>(name: &str, handle: Option<JoinHandle<T>>) -> Result<T> {
    match handle {
        Some(handle) => handle.join().map_err(|_| {
            error!(stage = name, "Pipeline thread panicked");
            Error::InvalidState(format!("{} thread panicked", name))
        }),
        None => Ok(T::default()),
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

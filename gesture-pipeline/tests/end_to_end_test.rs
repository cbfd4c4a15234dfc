//! End-to-end tests for the threaded pipeline
//!
//! The sampler thread reads a manual clock, so every sample the pipeline
//! sees is triggered by the test advancing time.

use gesture_pipeline::app::config::Config;
use gesture_pipeline::output::{OutputMode, RecordingActuator, RecordingLink, TextAccumulator};
use gesture_pipeline::pipeline::{PipelineBuilder, PipelineHandle, Receiver};
use gesture_pipeline::sensors::{HandPose, SimulatedGlove};
use gesture_pipeline::{ManualClock, RecognitionResult, Timestamp};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

/// Poll until the sampler has emitted `count` samples in total
fn wait_for_emitted(handle: &PipelineHandle, count: u64) {
    let deadline = Instant::now() + WAIT;
    while handle.stats().sampler.emitted < count {
        assert!(Instant::now() < deadline, "sampler did not emit {} samples", count);
        thread::sleep(Duration::from_millis(2));
    }
}

/// Poll until the processing stage has consumed `count` samples
fn wait_for_consumed(handle: &PipelineHandle, count: u64) {
    let deadline = Instant::now() + WAIT;
    while handle.stats().sensor_channel.received < count {
        assert!(Instant::now() < deadline, "stage did not receive {} samples", count);
        thread::sleep(Duration::from_millis(2));
    }
}

fn next_result(tap: &mut Receiver<RecognitionResult>) -> RecognitionResult {
    tap.recv_timeout(WAIT).expect("no recognition result")
}

struct Running {
    glove: SimulatedGlove,
    clock: ManualClock,
    handle: PipelineHandle,
    tap: Receiver<RecognitionResult>,
}

fn start(config: Config, pose: HandPose) -> Running {
    let glove = SimulatedGlove::with_pose(pose);
    let clock = ManualClock::default();
    let mut builder = PipelineBuilder::new(config)
        .with_drivers(glove.drivers())
        .with_clock(Arc::new(clock.clone()));
    let tap = builder.add_result_tap(16).unwrap();
    let handle = builder.spawn().unwrap();
    Running {
        glove,
        clock,
        handle,
        tap,
    }
}

#[test]
fn test_flat_hand_types_b_once_per_window() {
    let text = TextAccumulator::new();
    let view = text.view();
    let glove = SimulatedGlove::with_pose(HandPose::flat());
    let clock = ManualClock::default();

    let mut builder = PipelineBuilder::new(Config::default())
        .with_drivers(glove.drivers())
        .with_clock(Arc::new(clock.clone()))
        .with_text_accumulator(text);
    let mut tap = builder.add_result_tap(16).unwrap();
    let handle = builder.spawn().unwrap();

    // t=0: first sample recognized
    let first = next_result(&mut tap);
    assert_eq!(first.name, "B");
    assert_eq!(first.confidence, 1.0);
    assert_eq!(first.timestamp, Timestamp::ZERO);

    // Four more ticks inside the debounce window
    for (i, ms) in [20, 40, 60, 80].into_iter().enumerate() {
        clock.set(Timestamp::from_millis(ms));
        wait_for_emitted(&handle, i as u64 + 2);
    }
    wait_for_consumed(&handle, 5);

    // Past the window: the held gesture fires again
    clock.set(Timestamp::from_millis(600));
    let second = next_result(&mut tap);
    assert_eq!(second.name, "B");
    assert_eq!(second.timestamp, Timestamp::from_millis(600));
    assert_eq!(second.duration_ms, 600);

    let stats = handle.shutdown().unwrap();
    assert_eq!(stats.processing.recognized, 2);
    assert_eq!(stats.processing.processed, 6);
    assert_eq!(stats.sampler.dropped, 0);
    assert_eq!(stats.output.handled, 2);
    assert_eq!(view.text(), "BB");
    assert!(tap.try_recv().is_none());
}

#[test]
fn test_spelling_sequence() {
    let mut run = start(Config::default(), HandPose::fist());

    assert_eq!(next_result(&mut run.tap).name, "A");

    run.glove.set_pose(HandPose::flat());
    run.clock.set(Timestamp::from_millis(20));
    assert_eq!(next_result(&mut run.tap).name, "B");

    run.glove.set_pose(HandPose::fist());
    run.clock.set(Timestamp::from_millis(40));
    assert_eq!(next_result(&mut run.tap).name, "A");

    let deadline = Instant::now() + WAIT;
    while run.handle.text().as_deref() != Some("ABA") {
        assert!(Instant::now() < deadline, "text is {:?}", run.handle.text());
        thread::sleep(Duration::from_millis(2));
    }
    run.handle.shutdown().unwrap();
}

#[test]
fn test_notify_and_haptic_sinks() {
    let link = RecordingLink::new();
    let actuator = RecordingActuator::new();
    let mut config = Config::default();
    config.output.mode = OutputMode::TextAndNotify;
    config.output.haptic_intensity = 60;

    let glove = SimulatedGlove::with_pose(HandPose::flat());
    let mut builder = PipelineBuilder::new(config)
        .with_drivers(glove.drivers())
        .with_clock(Arc::new(ManualClock::default()))
        .with_wireless_link(Box::new(link.clone()))
        .with_haptic_actuator(Box::new(actuator.clone()));
    let mut tap = builder.add_result_tap(4).unwrap();
    let handle = builder.spawn().unwrap();

    assert_eq!(next_result(&mut tap).name, "B");
    // Output worker drains its queue before exiting
    let stats = handle.shutdown().unwrap();
    assert_eq!(stats.output.handled, 1);

    let frames = link.frames();
    assert_eq!(frames.len(), 1);
    // [id][len]["B"][f32 confidence]
    assert_eq!(&frames[0][..3], &[1, 1, b'B']);
    assert_eq!(&frames[0][3..], &1.0f32.to_le_bytes());
    assert_eq!(actuator.pulses(), 1);
}

#[test]
fn test_minimal_mode_only_pulses() {
    let actuator = RecordingActuator::new();
    let mut config = Config::default();
    config.output.mode = OutputMode::Minimal;

    let glove = SimulatedGlove::with_pose(HandPose::fist());
    let mut builder = PipelineBuilder::new(config)
        .with_drivers(glove.drivers())
        .with_clock(Arc::new(ManualClock::default()))
        .with_haptic_actuator(Box::new(actuator.clone()));
    let mut tap = builder.add_result_tap(4).unwrap();
    let handle = builder.spawn().unwrap();

    assert_eq!(next_result(&mut tap).name, "A");
    assert_eq!(handle.text(), None);
    handle.shutdown().unwrap();
    assert_eq!(actuator.pulses(), 1);
}

#[test]
fn test_missing_drivers_produce_nothing() {
    let mut builder = PipelineBuilder::new(Config::default());
    let mut tap = builder.add_result_tap(4).unwrap();
    let handle = builder.spawn().unwrap();

    thread::sleep(Duration::from_millis(50));
    assert!(tap.try_recv().is_none());

    let stats = handle.shutdown().unwrap();
    assert!(stats.sampler.ticks > 0);
    assert_eq!(stats.sampler.emitted, 0);
    assert_eq!(stats.processing.processed, 0);
}

#[test]
fn test_shutdown_is_prompt() {
    let run = start(Config::default(), HandPose::relaxed());
    let started = Instant::now();
    let stats = run.handle.shutdown().unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(stats.processing.recognized, 0);
}

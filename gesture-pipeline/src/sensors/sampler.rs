//! Multi-Rate Sampler
//!
//! Polls each modality when its own period has elapsed since the last
//! successful read, keeps the most recent reading of each, and emits a
//! [`Sample`] downstream whenever anything was updated.
//!
//! Touch changes can also arrive asynchronously through a
//! [`TouchPushHandle`]; every pushed status emits its own sample at the
//! start of the next iteration, without waiting for the touch period.
//!
//! Emission never blocks: on a full channel the new sample is dropped and
//! its sequence number is not reused.

use super::drivers::{SensorDrivers, TouchPushHandle};
use super::types::{
    CameraFrame, FlexReading, FramePayload, ImuReading, Modality, Sample, TouchReading,
    TOUCH_SENSOR_COUNT,
};
use crate::pipeline::channel::{self, Receiver, Sender};
use crate::time::clock::{Clock, Timestamp};
use crate::{Error, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pending touch pushes held between iterations
pub const TOUCH_PUSH_CAPACITY: usize = 8;

/// Per-modality sampling periods and loop timing
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerSchedule {
    pub flex_period: Duration,
    pub imu_period: Duration,
    pub touch_period: Duration,
    pub camera_period: Duration,
    pub touch_enabled: bool,
    pub camera_enabled: bool,
    /// Upper bound for a single driver read
    pub read_timeout: Duration,
    /// Sleep between loop iterations
    pub idle_delay: Duration,
}

impl Default for SamplerSchedule {
    fn default() -> Self {
        Self {
            flex_period: Duration::from_millis(20),
            imu_period: Duration::from_millis(10),
            touch_period: Duration::from_millis(50),
            camera_period: Duration::from_millis(66),
            touch_enabled: true,
            camera_enabled: false,
            read_timeout: Duration::from_millis(5),
            idle_delay: Duration::from_millis(5),
        }
    }
}

impl SamplerSchedule {
    /// Polling period of a modality, `None` when it is disabled
    pub fn period(&self, modality: Modality) -> Option<Duration> {
        match modality {
            Modality::Flex => Some(self.flex_period),
            Modality::Inertial => Some(self.imu_period),
            Modality::Touch => self.touch_enabled.then_some(self.touch_period),
            Modality::Camera => self.camera_enabled.then_some(self.camera_period),
        }
    }
}

/// Live sampler counters, readable from other threads
#[derive(Debug, Default)]
pub struct SamplerCounters {
    ticks: AtomicU64,
    emitted: AtomicU64,
    dropped: AtomicU64,
    touch_pushes: AtomicU64,
    read_failures: [AtomicU64; 4],
}

impl SamplerCounters {
    pub fn snapshot(&self) -> SamplerStats {
        SamplerStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            touch_pushes: self.touch_pushes.load(Ordering::Relaxed),
            read_failures: [
                self.read_failures[0].load(Ordering::Relaxed),
                self.read_failures[1].load(Ordering::Relaxed),
                self.read_failures[2].load(Ordering::Relaxed),
                self.read_failures[3].load(Ordering::Relaxed),
            ],
        }
    }
}

/// Point-in-time sampler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SamplerStats {
    /// Loop iterations
    pub ticks: u64,
    /// Samples accepted by the downstream channel
    pub emitted: u64,
    /// Samples rejected by a full channel
    pub dropped: u64,
    /// Touch statuses received through the push path
    pub touch_pushes: u64,
    /// Failed reads, indexed by [`Modality::index`]
    pub read_failures: [u64; 4],
}

/// What one iteration produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub emitted: u32,
    pub dropped: u32,
}

/// Most recent successful reading of each modality
#[derive(Debug, Default)]
struct CurrentReadings {
    flex: Option<FlexReading>,
    imu: Option<ImuReading>,
    touch: Option<TouchReading>,
}

fn record_failure(counters: &SamplerCounters, modality: Modality, error: &Error) {
    counters.read_failures[modality.index()].fetch_add(1, Ordering::Relaxed);
    warn!(modality = modality.as_str(), error = %error, "Sensor read failed");
}

/// Sensor polling loop
pub struct Sampler {
    drivers: SensorDrivers,
    schedule: SamplerSchedule,
    clock: Arc<dyn Clock>,
    sender: Sender<Sample>,
    touch_pushes: Option<Receiver<[bool; TOUCH_SENSOR_COUNT]>>,
    current: CurrentReadings,
    last_sampled: [Option<Timestamp>; 4],
    next_sequence: u64,
    counters: Arc<SamplerCounters>,
}

impl Sampler {
    /// Create a sampler and attach the touch push path when supported
    pub fn new(
        mut drivers: SensorDrivers,
        schedule: SamplerSchedule,
        clock: Arc<dyn Clock>,
        sender: Sender<Sample>,
    ) -> Result<Self> {
        let mut touch_pushes = None;
        if schedule.touch_enabled {
            if let Some(touch) = drivers.touch.as_mut() {
                let (push_tx, push_rx) = channel::bounded("touch-push", TOUCH_PUSH_CAPACITY)?;
                match touch.attach_push(TouchPushHandle::new(push_tx)) {
                    Ok(()) => touch_pushes = Some(push_rx),
                    Err(Error::Unsupported(_)) => {
                        debug!("Touch driver has no push path, polling only");
                    }
                    Err(e) => warn!(error = %e, "Failed to attach touch push handle"),
                }
            }
        }

        Ok(Self {
            drivers,
            schedule,
            clock,
            sender,
            touch_pushes,
            current: CurrentReadings::default(),
            last_sampled: [None; 4],
            next_sequence: 0,
            counters: Arc::new(SamplerCounters::default()),
        })
    }

    /// Shared counters for observers on other threads
    pub fn counters(&self) -> Arc<SamplerCounters> {
        Arc::clone(&self.counters)
    }

    pub fn stats(&self) -> SamplerStats {
        self.counters.snapshot()
    }

    /// Run one sampling iteration
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);

        self.drain_touch_pushes(&mut report);

        let now = self.clock.now();
        let mut updated = false;
        updated |= self.poll_flex(now);
        updated |= self.poll_imu(now);
        updated |= self.poll_touch(now);
        let camera = self.poll_camera(now);
        updated |= camera.is_some();

        if updated {
            self.emit(now, camera, &mut report);
        }
        report
    }

    /// Loop until `stop` is set
    pub fn run(&mut self, stop: &AtomicBool) -> SamplerStats {
        info!(schedule = ?self.schedule, "Sampler started");
        while !stop.load(Ordering::Relaxed) {
            self.tick();
            thread::sleep(self.schedule.idle_delay);
        }
        let stats = self.stats();
        info!(
            emitted = stats.emitted,
            dropped = stats.dropped,
            "Sampler stopped"
        );
        stats
    }

    fn drain_touch_pushes(&mut self, report: &mut TickReport) {
        loop {
            let Some(contacts) = self.touch_pushes.as_mut().and_then(|rx| rx.try_recv()) else {
                break;
            };
            let now = self.clock.now();
            self.current.touch = Some(TouchReading::new(contacts, now));
            self.last_sampled[Modality::Touch.index()] = Some(now);
            self.counters.touch_pushes.fetch_add(1, Ordering::Relaxed);
            self.emit(now, None, report);
        }
    }

    fn is_due(&self, modality: Modality, now: Timestamp) -> bool {
        let Some(period) = self.schedule.period(modality) else {
            return false;
        };
        match self.last_sampled[modality.index()] {
            Some(last) => now.duration_since(last) >= period,
            None => true,
        }
    }

    fn poll_flex(&mut self, now: Timestamp) -> bool {
        if !self.is_due(Modality::Flex, now) {
            return false;
        }
        let Some(driver) = self.drivers.flex.as_mut() else {
            return false;
        };
        match driver.read_angles(self.schedule.read_timeout) {
            Ok(measurement) => {
                let mut reading = FlexReading::new(measurement.angles, now);
                if let Some(raw) = measurement.raw {
                    reading = reading.with_raw(raw);
                }
                self.current.flex = Some(reading);
                self.last_sampled[Modality::Flex.index()] = Some(now);
                true
            }
            Err(e) => {
                self.current.flex = None;
                record_failure(&self.counters, Modality::Flex, &e);
                false
            }
        }
    }

    fn poll_imu(&mut self, now: Timestamp) -> bool {
        if !self.is_due(Modality::Inertial, now) {
            return false;
        }
        let Some(driver) = self.drivers.imu.as_mut() else {
            return false;
        };
        match driver.read(self.schedule.read_timeout) {
            Ok(m) => {
                self.current.imu = Some(ImuReading {
                    accel: m.accel,
                    gyro: m.gyro,
                    orientation: m.orientation,
                    temperature: m.temperature,
                    timestamp: now,
                });
                self.last_sampled[Modality::Inertial.index()] = Some(now);
                true
            }
            Err(e) => {
                self.current.imu = None;
                record_failure(&self.counters, Modality::Inertial, &e);
                false
            }
        }
    }

    fn poll_touch(&mut self, now: Timestamp) -> bool {
        if !self.is_due(Modality::Touch, now) {
            return false;
        }
        let Some(driver) = self.drivers.touch.as_mut() else {
            return false;
        };
        match driver.read_status(self.schedule.read_timeout) {
            Ok(contacts) => {
                self.current.touch = Some(TouchReading::new(contacts, now));
                self.last_sampled[Modality::Touch.index()] = Some(now);
                true
            }
            Err(e) => {
                self.current.touch = None;
                record_failure(&self.counters, Modality::Touch, &e);
                false
            }
        }
    }

    /// Capture, copy, and release one frame
    fn poll_camera(&mut self, now: Timestamp) -> Option<CameraFrame> {
        if !self.is_due(Modality::Camera, now) {
            return None;
        }
        let driver = self.drivers.camera.as_mut()?;

        let copied = match driver.capture_frame(self.schedule.read_timeout) {
            Ok(view) => FramePayload::copy_from(view.bytes).map(|payload| CameraFrame {
                width: view.width,
                height: view.height,
                format: view.format,
                timestamp: now,
                payload,
            }),
            Err(e) => {
                record_failure(&self.counters, Modality::Camera, &e);
                return None;
            }
        };
        // The driver buffer goes back whether or not the copy succeeded
        driver.release_frame();

        match copied {
            Ok(frame) => {
                self.last_sampled[Modality::Camera.index()] = Some(now);
                Some(frame)
            }
            Err(e) => {
                record_failure(&self.counters, Modality::Camera, &e);
                None
            }
        }
    }

    fn emit(&mut self, now: Timestamp, camera: Option<CameraFrame>, report: &mut TickReport) {
        let sample = Sample {
            sequence: self.next_sequence,
            timestamp: now,
            flex: self.current.flex,
            imu: self.current.imu,
            touch: self.current.touch,
            camera,
        };
        if !sample.has_any_reading() {
            return;
        }
        let sequence = sample.sequence;
        self.next_sequence += 1;

        match self.sender.try_send(sample) {
            Ok(()) => {
                self.counters.emitted.fetch_add(1, Ordering::Relaxed);
                report.emitted += 1;
            }
            Err(_) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                report.dropped += 1;
                warn!(
                    channel = self.sender.name(),
                    sequence,
                    "Sample dropped (channel full)"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::simulated::{HandPose, SimulatedGlove};
    use crate::time::clock::ManualClock;

    struct Fixture {
        glove: SimulatedGlove,
        clock: ManualClock,
        sampler: Sampler,
        rx: Receiver<Sample>,
    }

    fn fixture(schedule: SamplerSchedule, capacity: usize) -> Fixture {
        let glove = SimulatedGlove::with_pose(HandPose::flat());
        let clock = ManualClock::default();
        let (tx, rx) = channel::bounded("sensor", capacity).unwrap();
        let sampler = Sampler::new(glove.drivers(), schedule, Arc::new(clock.clone()), tx).unwrap();
        Fixture {
            glove,
            clock,
            sampler,
            rx,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_first_tick_samples_everything_due() {
        let mut f = fixture(SamplerSchedule::default(), 16);
        let report = f.sampler.tick();
        assert_eq!(report.emitted, 1);

        let sample = f.rx.try_recv().unwrap();
        assert_eq!(sample.sequence, 0);
        assert!(sample.flex.is_some());
        assert!(sample.imu.is_some());
        assert!(sample.touch.is_some());
        assert!(sample.camera.is_none());
    }

    #[test]
    fn test_modalities_follow_their_periods() {
        let mut f = fixture(SamplerSchedule::default(), 64);
        f.sampler.tick();
        f.rx.try_recv().unwrap();

        // 10 ms: only IMU is due, flex reading stays from t=0
        f.clock.advance(ms(10));
        assert_eq!(f.sampler.tick().emitted, 1);
        let sample = f.rx.try_recv().unwrap();
        assert_eq!(sample.imu.unwrap().timestamp, Timestamp::from_millis(10));
        assert_eq!(sample.flex.unwrap().timestamp, Timestamp::from_millis(0));

        // 15 ms: nothing due, nothing emitted
        f.clock.advance(ms(5));
        assert_eq!(f.sampler.tick().emitted, 0);
        assert!(f.rx.is_empty());

        // 20 ms: flex and IMU
        f.clock.advance(ms(5));
        f.sampler.tick();
        let sample = f.rx.try_recv().unwrap();
        assert_eq!(sample.flex.unwrap().timestamp, Timestamp::from_millis(20));
        assert_eq!(sample.sequence, 2);
    }

    #[test]
    fn test_failed_read_invalidates_modality() {
        let mut f = fixture(SamplerSchedule::default(), 16);
        f.sampler.tick();
        f.rx.try_recv().unwrap();

        f.glove.fail_reads(Modality::Flex, 1);
        f.clock.advance(ms(20));
        f.sampler.tick();
        let sample = f.rx.try_recv().unwrap();
        assert!(sample.flex.is_none());
        assert!(sample.imu.is_some());
        assert_eq!(f.sampler.stats().read_failures[Modality::Flex.index()], 1);

        // Failure did not advance the last-sampled time; retried next tick
        f.clock.advance(ms(1));
        f.sampler.tick();
        assert!(f.rx.try_recv().unwrap().flex.is_some());
    }

    #[test]
    fn test_no_valid_reading_emits_nothing() {
        let mut schedule = SamplerSchedule::default();
        schedule.touch_enabled = false;
        let mut f = fixture(schedule, 16);
        f.glove.fail_reads(Modality::Flex, 1);
        f.glove.fail_reads(Modality::Inertial, 1);

        assert_eq!(f.sampler.tick(), TickReport::default());
        assert!(f.rx.is_empty());
    }

    #[test]
    fn test_full_channel_drops_newest_and_consumes_sequence() {
        let mut f = fixture(SamplerSchedule::default(), 2);
        for _ in 0..4 {
            f.sampler.tick();
            f.clock.advance(ms(10));
        }
        let stats = f.sampler.stats();
        assert_eq!(stats.emitted, 2);
        assert_eq!(stats.dropped, 2);

        assert_eq!(f.rx.try_recv().unwrap().sequence, 0);
        assert_eq!(f.rx.try_recv().unwrap().sequence, 1);

        f.sampler.tick();
        assert_eq!(f.rx.try_recv().unwrap().sequence, 4);
    }

    #[test]
    fn test_touch_push_bypasses_period() {
        let mut f = fixture(SamplerSchedule::default(), 16);
        f.sampler.tick();
        f.rx.try_recv().unwrap();

        f.clock.advance(ms(3));
        assert!(f.glove.press([true, false, false, false, false]));
        let report = f.sampler.tick();
        assert_eq!(report.emitted, 1);

        let sample = f.rx.try_recv().unwrap();
        let touch = sample.touch.unwrap();
        assert_eq!(touch.contacts, [true, false, false, false, false]);
        assert_eq!(touch.timestamp, Timestamp::from_millis(3));
        assert_eq!(f.sampler.stats().touch_pushes, 1);
    }

    #[test]
    fn test_camera_frame_copied_and_released() {
        let mut schedule = SamplerSchedule::default();
        schedule.camera_enabled = true;
        let mut f = fixture(schedule, 16);

        f.sampler.tick();
        let sample = f.rx.try_recv().unwrap();
        let frame = sample.camera.as_ref().unwrap();
        assert_eq!(frame.payload.len(), 32 * 24 * 2);
        assert_eq!(f.glove.frame_counts(), (1, 1));

        // Camera is not sticky: the next sample carries no frame
        f.clock.advance(ms(10));
        f.sampler.tick();
        assert!(f.rx.try_recv().unwrap().camera.is_none());

        f.clock.advance(ms(60));
        f.sampler.tick();
        assert!(f.rx.try_recv().unwrap().camera.is_some());
        assert_eq!(f.glove.frames_outstanding(), 0);
    }

    #[test]
    fn test_run_stops_on_flag() {
        let mut f = fixture(SamplerSchedule::default(), 4);
        let stop = AtomicBool::new(true);
        let stats = f.sampler.run(&stop);
        assert_eq!(stats.ticks, 0);
    }
}

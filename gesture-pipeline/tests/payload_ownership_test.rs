//! Camera payload ownership under a counting allocator
//!
//! Every payload copied into the history ring must be released exactly once,
//! whether it leaves by eviction, by `pop`, or when the ring is dropped.
//! This binary holds a single test because the allocator counts globally.

use gesture_pipeline::pipeline::HistoryBuffer;
use gesture_pipeline::sensors::types::{FramePayload, PixelFormat};
use gesture_pipeline::{CameraFrame, Sample, Timestamp};
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::sync::atomic::{AtomicIsize, Ordering};

struct CountingAllocator;

static LIVE_BYTES: AtomicIsize = AtomicIsize::new(0);

thread_local! {
    static TRACKING: Cell<bool> = const { Cell::new(false) };
}

fn tracking() -> bool {
    TRACKING.try_with(Cell::get).unwrap_or(false)
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() && tracking() {
            LIVE_BYTES.fetch_add(layout.size() as isize, Ordering::SeqCst);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if tracking() {
            LIVE_BYTES.fetch_sub(layout.size() as isize, Ordering::SeqCst);
        }
        System.dealloc(ptr, layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new = System.realloc(ptr, layout, new_size);
        if !new.is_null() && tracking() {
            LIVE_BYTES.fetch_add(new_size as isize - layout.size() as isize, Ordering::SeqCst);
        }
        new
    }
}

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator;

const FRAME_BYTES: usize = 4096;

fn camera_sample(sequence: u64) -> Sample {
    let ts = Timestamp::from_millis(sequence * 66);
    Sample::new(sequence, ts).with_camera(CameraFrame {
        width: 64,
        height: 32,
        format: PixelFormat::Rgb565,
        timestamp: ts,
        payload: FramePayload::from_vec(vec![sequence as u8; FRAME_BYTES]),
    })
}

/// Push, evict, pop, and drop a ring of camera samples
fn exercise_history() -> (usize, usize) {
    let mut history = HistoryBuffer::new(4).unwrap();
    for sequence in 0..32 {
        let sample = camera_sample(sequence);
        history.push(&sample);
        // Producer keeps ownership of its own frame
        drop(sample);
    }
    let held_when_full = history.payload_bytes();

    let popped = history.pop().unwrap();
    assert_eq!(popped.sequence, 28);
    assert_eq!(popped.camera.as_ref().unwrap().payload.as_bytes()[0], 28);
    drop(popped);
    let held_after_pop = history.payload_bytes();

    drop(history);
    (held_when_full, held_after_pop)
}

/// Measure net live bytes across `f` on this thread
fn net_allocation<T>(f: impl FnOnce() -> T) -> (T, isize) {
    let before = LIVE_BYTES.load(Ordering::SeqCst);
    TRACKING.with(|t| t.set(true));
    let value = f();
    TRACKING.with(|t| t.set(false));
    (value, LIVE_BYTES.load(Ordering::SeqCst) - before)
}

#[test]
fn test_history_releases_every_payload_once() {
    // Warm-up pass outside tracking registers logging callsites
    exercise_history();

    let ((held_when_full, held_after_pop), leaked) = net_allocation(exercise_history);

    assert_eq!(held_when_full, 4 * FRAME_BYTES);
    assert_eq!(held_after_pop, 3 * FRAME_BYTES);
    assert_eq!(leaked, 0, "history leaked {} bytes", leaked);

    // Peak while full stays bounded by the ring, not the number of pushes
    let (peak, _) = net_allocation(|| {
        let mut history = HistoryBuffer::new(4).unwrap();
        let mut peak = 0isize;
        let base = LIVE_BYTES.load(Ordering::SeqCst);
        for sequence in 0..64 {
            history.push(&camera_sample(sequence));
            peak = peak.max(LIVE_BYTES.load(Ordering::SeqCst) - base);
        }
        peak
    });
    assert!(peak < (6 * FRAME_BYTES) as isize, "peak {} bytes", peak);
}

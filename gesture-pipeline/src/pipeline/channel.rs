//! Bounded SPSC Channel
//!
//! Lock-free single-producer/single-consumer channel connecting pipeline
//! stages. Every edge of the pipeline gets its own channel, constructed
//! explicitly at startup and moved into the two tasks it connects.
//!
//! Semantics:
//! - Sender: never blocks. On a full channel the *new* value is rejected
//!   and handed back to the caller (drop-newest, at-most-once, no retry)
//! - Receiver: `recv_timeout` waits a bounded time, so the consuming loop
//!   can still run periodic housekeeping when nothing arrives
//!
//! Values are moved through the channel; nothing is shared by reference
//! across the task boundary. The core ring is `rtrb`.

use crate::{Error, Result};
use rtrb::{Consumer, Producer, RingBuffer};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sleep granularity while waiting in `recv_timeout`
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Channel statistics for monitoring
#[derive(Debug, Default)]
pub struct ChannelStats {
    /// Values accepted by the channel
    pub sent: AtomicU64,
    /// Values rejected because the channel was full
    pub dropped: AtomicU64,
    /// Values taken by the receiver
    pub received: AtomicU64,
    /// Peak channel occupancy
    pub peak_occupancy: AtomicU64,
}

impl ChannelStats {
    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            peak_occupancy: self.peak_occupancy.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`ChannelStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelSnapshot {
    pub sent: u64,
    pub dropped: u64,
    pub received: u64,
    pub peak_occupancy: u64,
}

/// Create a bounded channel holding at most `capacity` values.
///
/// `name` identifies the pipeline edge in logs.
pub fn bounded<T>(name: &'static str, capacity: usize) -> Result<(Sender<T>, Receiver<T>)> {
    if capacity == 0 {
        return Err(Error::InvalidArgument(format!(
            "channel '{}' capacity must be > 0",
            name
        )));
    }

    let (producer, consumer) = RingBuffer::new(capacity);
    let stats = Arc::new(ChannelStats::default());

    Ok((
        Sender {
            inner: producer,
            stats: Arc::clone(&stats),
            name,
            capacity,
        },
        Receiver {
            inner: consumer,
            stats,
            name,
        },
    ))
}

/// Producer half of a channel
pub struct Sender<T> {
    inner: Producer<T>,
    stats: Arc<ChannelStats>,
    name: &'static str,
    capacity: usize,
}

impl<T> Sender<T> {
    /// Enqueue a value without blocking.
    ///
    /// If the channel is full the value is handed back in `Err` and the
    /// drop counter is incremented; the caller decides how to report it.
    #[inline]
    pub fn try_send(&mut self, value: T) -> std::result::Result<(), T> {
        match self.inner.push(value) {
            Ok(()) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);

                // Update peak occupancy
                let occupied = (self.capacity - self.inner.slots()) as u64;
                self.stats
                    .peak_occupancy
                    .fetch_max(occupied, Ordering::Relaxed);

                Ok(())
            }
            Err(rtrb::PushError::Full(value)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(value)
            }
        }
    }

    /// Check available slots without sending
    #[inline]
    pub fn available_slots(&self) -> usize {
        self.inner.slots()
    }

    /// Check if channel is full
    #[inline]
    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    /// Check if the receiver has been dropped
    #[inline]
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shared statistics
    pub fn stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.stats)
    }
}

/// Consumer half of a channel
pub struct Receiver<T> {
    inner: Consumer<T>,
    stats: Arc<ChannelStats>,
    name: &'static str,
}

impl<T> Receiver<T> {
    /// Take the oldest value, if any
    #[inline]
    pub fn try_recv(&mut self) -> Option<T> {
        match self.inner.pop() {
            Ok(value) => {
                self.stats.received.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(_) => None,
        }
    }

    /// Wait up to `timeout` for a value.
    ///
    /// Returns `None` on timeout, or as soon as the channel is empty and the
    /// sender has gone away.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(value) = self.try_recv() {
                return Some(value);
            }
            if self.inner.is_abandoned() && self.inner.is_empty() {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Take up to `max_count` values at once (batch processing)
    pub fn drain_batch(&mut self, max_count: usize) -> Vec<T> {
        let mut batch = Vec::with_capacity(max_count.min(self.len()));
        for _ in 0..max_count {
            match self.try_recv() {
                Some(value) => batch.push(value),
                None => break,
            }
        }
        batch
    }

    /// Peek at the next value without removing it
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.inner.peek().ok()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of queued values
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.slots()
    }

    /// Check if the sender has been dropped
    #[inline]
    pub fn is_abandoned(&self) -> bool {
        self.inner.is_abandoned()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Shared statistics
    pub fn stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_zero_capacity_rejected() {
        let result = bounded::<u32>("test", 0);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_send_and_recv() {
        let (mut tx, mut rx) = bounded("test", 4).unwrap();
        assert!(tx.try_send(7u32).is_ok());
        assert_eq!(rx.try_recv(), Some(7));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_full_channel_drops_newest() {
        let (mut tx, mut rx) = bounded("test", 3).unwrap();
        for i in 0..3u32 {
            assert!(tx.try_send(i).is_ok());
        }
        assert!(tx.is_full());

        // The rejected value comes back, queued values are untouched
        assert_eq!(tx.try_send(99), Err(99));
        assert_eq!(rx.drain_batch(10), vec![0, 1, 2]);
    }

    #[test]
    fn test_fifo_order() {
        let (mut tx, mut rx) = bounded("test", 16).unwrap();
        for i in 0..10u64 {
            tx.try_send(i).unwrap();
        }
        for i in 0..10u64 {
            assert_eq!(rx.try_recv(), Some(i));
        }
    }

    #[test]
    fn test_statistics() {
        let (mut tx, mut rx) = bounded("test", 4).unwrap();
        let stats = tx.stats();

        for i in 0..6u8 {
            let _ = tx.try_send(i);
        }
        assert_eq!(stats.sent.load(Ordering::Relaxed), 4);
        assert_eq!(stats.dropped.load(Ordering::Relaxed), 2);

        rx.drain_batch(4);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 4);
        assert_eq!(snapshot.peak_occupancy, 4);
    }

    #[test]
    fn test_peak_occupancy_is_monotonic() {
        let (mut tx, mut rx) = bounded("test", 16).unwrap();
        let stats = tx.stats();

        for i in 0..10u32 {
            tx.try_send(i).unwrap();
        }
        rx.drain_batch(5);
        assert_eq!(stats.peak_occupancy.load(Ordering::Relaxed), 10);

        for i in 0..8u32 {
            tx.try_send(i).unwrap();
        }
        assert_eq!(stats.peak_occupancy.load(Ordering::Relaxed), 13);
    }

    #[test]
    fn test_recv_timeout_expires() {
        let (_tx, mut rx) = bounded::<u32>("test", 4).unwrap();
        let start = Instant::now();
        assert_eq!(rx.recv_timeout(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_recv_timeout_returns_early_when_abandoned() {
        let (tx, mut rx) = bounded::<u32>("test", 4).unwrap();
        drop(tx);
        let start = Instant::now();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)), None);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(rx.is_abandoned());
    }

    #[test]
    fn test_abandoned_channel_still_drains() {
        let (mut tx, mut rx) = bounded::<u32>("test", 4).unwrap();
        tx.try_send(1).unwrap();
        drop(tx);
        assert_eq!(rx.recv_timeout(Duration::from_millis(10)), Some(1));
    }

    #[test]
    fn test_peek_does_not_consume() {
        let (mut tx, mut rx) = bounded("test", 4).unwrap();
        assert!(rx.peek().is_none());
        tx.try_send(5u32).unwrap();
        assert_eq!(rx.peek(), Some(&5));
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.try_recv(), Some(5));
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        let (mut tx, mut rx) = bounded("test", 256).unwrap();
        let stats = tx.stats();

        let producer = thread::spawn(move || {
            for i in 0..100u64 {
                while tx.try_send(i).is_err() {
                    thread::sleep(Duration::from_micros(10));
                }
            }
        });

        let consumer = thread::spawn(move || {
            let mut received = Vec::new();
            while received.len() < 100 {
                if let Some(v) = rx.recv_timeout(Duration::from_millis(100)) {
                    received.push(v);
                }
            }
            received
        });

        producer.join().unwrap();
        let received = consumer.join().unwrap();

        assert_eq!(received, (0..100).collect::<Vec<u64>>());
        assert_eq!(stats.sent.load(Ordering::Relaxed), 100);
        assert_eq!(stats.received.load(Ordering::Relaxed), 100);
    }
}

//! Statistics for the frame relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Relay-wide counters
///
/// All counters are relaxed atomics; readers get an approximate, monotonic view.
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    frames_rejected: AtomicU64,
    frames_dropped: AtomicU64,
    subscribers_total: AtomicU64,
    subscribers_active: AtomicU64,
    transport_failures: AtomicU64,
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayStats {
    /// Create a zeroed stats tracker
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            subscribers_total: AtomicU64::new(0),
            subscribers_active: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_frame(&self, bytes: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self, count: u64) {
        if count > 0 {
            self.frames_dropped.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub(crate) fn subscriber_added(&self) {
        self.subscribers_total.fetch_add(1, Ordering::Relaxed);
        self.subscribers_active.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn subscriber_removed(&self) {
        // Saturate instead of wrapping if removals ever race ahead of adds
        let _ = self
            .subscribers_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub(crate) fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the tracker was created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Average ingest rate since start
    pub fn frames_per_second(&self) -> f64 {
        let secs = self.uptime().as_secs_f64();
        if secs > 0.0 {
            self.frames_received.load(Ordering::Relaxed) as f64 / secs
        } else {
            0.0
        }
    }

    /// Capture a serializable copy of the counters
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            subscribers_total: self.subscribers_total.load(Ordering::Relaxed),
            subscribers_active: self.subscribers_active.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            frames_per_second: self.frames_per_second(),
        }
    }
}

/// Point-in-time copy of [`RelayStats`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelayStatsSnapshot {
    /// Seconds since the relay started
    pub uptime_secs: u64,
    /// Frames accepted by the store
    pub frames_received: u64,
    /// Bytes accepted by the store
    pub bytes_received: u64,
    /// Frames rejected at ingest
    pub frames_rejected: u64,
    /// Queued frames discarded by the drop-oldest policy
    pub frames_dropped: u64,
    /// Subscribers ever registered
    pub subscribers_total: u64,
    /// Subscribers currently registered
    pub subscribers_active: u64,
    /// Subscribers removed after a failed write
    pub transport_failures: u64,
    /// Average ingest rate
    pub frames_per_second: f64,
}

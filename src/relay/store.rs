//! Latest-frame store
//!
//! A single cell holding the most recent frame. Writers swap the whole frame
//! under a write lock, so readers see either the previous frame or the new one,
//! never a partial write.

use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;

use super::config::RelayConfig;
use super::error::RelayError;
use super::frame::Frame;

#[derive(Debug, Default)]
struct Slot {
    frame: Option<Frame>,
    next_sequence: u64,
}

/// Holds the most recently received frame
///
/// Thread-safe via `RwLock`; neither operation awaits while holding the lock.
#[derive(Debug)]
pub struct FrameStore {
    slot: RwLock<Slot>,
    staleness_threshold: Duration,
    max_frame_size: usize,
}

impl FrameStore {
    /// Create an empty store with default configuration
    pub fn new() -> Self {
        Self::with_config(&RelayConfig::default())
    }

    /// Create an empty store with custom configuration
    pub fn with_config(config: &RelayConfig) -> Self {
        Self {
            slot: RwLock::new(Slot {
                frame: None,
                next_sequence: 1,
            }),
            staleness_threshold: config.staleness_threshold,
            max_frame_size: config.max_frame_size,
        }
    }

    /// Install `data` as the latest frame
    ///
    /// Returns the stored frame with its sequence number assigned. Empty or
    /// oversized input is rejected and the current frame is kept.
    pub fn replace(&self, data: impl Into<Bytes>) -> Result<Frame, RelayError> {
        let data = data.into();

        if data.len() > self.max_frame_size {
            tracing::warn!(
                size = data.len(),
                limit = self.max_frame_size,
                "Rejected oversized frame"
            );
            return Err(RelayError::FrameTooLarge {
                size: data.len(),
                limit: self.max_frame_size,
            });
        }

        let frame = Frame::new(data).inspect_err(|_| {
            tracing::warn!("Rejected empty frame");
        })?;

        let mut slot = self.slot.write();
        let frame = frame.with_sequence(slot.next_sequence);
        slot.next_sequence += 1;
        slot.frame = Some(frame.clone());
        drop(slot);

        tracing::debug!(
            sequence = frame.sequence(),
            size = frame.len(),
            "Frame stored"
        );

        Ok(frame)
    }

    /// Get the latest frame unless it is older than the staleness threshold
    pub fn snapshot(&self) -> Option<Frame> {
        let slot = self.slot.read();
        slot.frame
            .as_ref()
            .filter(|frame| frame.age() <= self.staleness_threshold)
            .cloned()
    }

    /// Get the latest frame regardless of its age
    pub fn latest(&self) -> Option<Frame> {
        self.slot.read().frame.clone()
    }

    /// Age of the held frame, if any
    pub fn last_frame_age(&self) -> Option<Duration> {
        self.slot.read().frame.as_ref().map(Frame::age)
    }

    /// True when a frame is held but has outlived the staleness threshold
    pub fn is_stale(&self) -> bool {
        self.last_frame_age()
            .is_some_and(|age| age > self.staleness_threshold)
    }

    /// The configured staleness threshold
    pub fn staleness_threshold(&self) -> Duration {
        self.staleness_threshold
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

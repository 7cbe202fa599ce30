//! Relay configuration

use std::time::Duration;

/// Default number of frames a subscriber may have queued
pub const DEFAULT_QUEUE_CAPACITY: usize = 2;

/// Age after which the latest frame is treated as absent
pub const DEFAULT_STALENESS_THRESHOLD: Duration = Duration::from_secs(10);

/// Largest frame accepted by the store (4MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// How frames are encoded before being queued for subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadEncoding {
    /// Standard base64 text, for transports that only carry text
    #[default]
    Base64,
    /// Frame bytes as received
    Raw,
}

/// Configuration for the frame store and broadcaster
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Per-subscriber delivery queue capacity (always at least 1)
    pub queue_capacity: usize,

    /// Snapshots older than this report no frame
    pub staleness_threshold: Duration,

    /// Maximum accepted frame size in bytes
    pub max_frame_size: usize,

    /// Payload encoding applied once per published frame
    pub encoding: PayloadEncoding,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            staleness_threshold: DEFAULT_STALENESS_THRESHOLD,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            encoding: PayloadEncoding::Base64,
        }
    }
}

impl RelayConfig {
    /// Set the per-subscriber queue capacity
    ///
    /// A capacity of zero would make every publish a drop, so it is raised to 1.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the staleness threshold
    pub fn staleness_threshold(mut self, threshold: Duration) -> Self {
        self.staleness_threshold = threshold;
        self
    }

    /// Set the maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the payload encoding
    pub fn encoding(mut self, encoding: PayloadEncoding) -> Self {
        self.encoding = encoding;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();

        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.staleness_threshold, Duration::from_secs(10));
        assert_eq!(config.max_frame_size, 4 * 1024 * 1024);
        assert_eq!(config.encoding, PayloadEncoding::Base64);
    }

    #[test]
    fn test_queue_capacity_floor() {
        let config = RelayConfig::default().queue_capacity(0);

        assert_eq!(config.queue_capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RelayConfig::default()
            .queue_capacity(4)
            .staleness_threshold(Duration::from_millis(500))
            .max_frame_size(1024)
            .encoding(PayloadEncoding::Raw);

        assert_eq!(config.queue_capacity, 4);
        assert_eq!(config.staleness_threshold, Duration::from_millis(500));
        assert_eq!(config.max_frame_size, 1024);
        assert_eq!(config.encoding, PayloadEncoding::Raw);
    }
}

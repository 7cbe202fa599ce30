//! Relay error types

use thiserror::Error;

use super::subscriber::SubscriberId;

/// Error type for relay operations
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// Zero-length frame data
    #[error("Frame data is empty")]
    EmptyInput,
    /// Frame exceeds the configured maximum size
    #[error("Frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },
    /// A subscriber's transport write failed
    #[error("Send to subscriber {subscriber} failed: {reason}")]
    TransportSendFailure {
        subscriber: SubscriberId,
        reason: String,
    },
    /// A subscriber's transport write did not complete in time
    #[error("Send to subscriber {subscriber} timed out")]
    SendTimeout { subscriber: SubscriberId },
}

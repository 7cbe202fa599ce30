//! Frame types
//!
//! A [`Frame`] is one still image from the camera. Its bytes are never parsed.
//! An [`EncodedFrame`] is the payload form handed to subscribers; it is computed
//! once per published frame and shared by every subscriber queue.

use std::time::{Duration, Instant, SystemTime};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use super::config::PayloadEncoding;
use super::error::RelayError;

/// One immutable camera frame
///
/// Cheap to clone: the image bytes are reference counted and never copied.
#[derive(Debug, Clone)]
pub struct Frame {
    sequence: u64,
    data: Bytes,
    captured_at: Instant,
    received_at: SystemTime,
}

impl Frame {
    /// Create a frame stamped with the current time
    ///
    /// Returns `EmptyInput` for zero-length data.
    pub fn new(data: impl Into<Bytes>) -> Result<Self, RelayError> {
        let data = data.into();
        if data.is_empty() {
            return Err(RelayError::EmptyInput);
        }

        Ok(Self {
            sequence: 0,
            data,
            captured_at: Instant::now(),
            received_at: SystemTime::now(),
        })
    }

    pub(super) fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Position of this frame in its store's replace order (0 if never stored)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Image bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false for a constructed frame
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Monotonic arrival time
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Wall-clock arrival time
    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// Time elapsed since arrival
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}

/// A frame in its subscriber payload form
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    frame: Frame,
    encoding: PayloadEncoding,
    payload: Bytes,
}

impl EncodedFrame {
    /// Encode a frame
    pub fn encode(frame: Frame, encoding: PayloadEncoding) -> Self {
        let payload = match encoding {
            PayloadEncoding::Base64 => Bytes::from(STANDARD.encode(frame.data())),
            PayloadEncoding::Raw => frame.data().clone(),
        };

        Self {
            frame,
            encoding,
            payload,
        }
    }

    /// The source frame
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Sequence number of the source frame
    pub fn sequence(&self) -> u64 {
        self.frame.sequence()
    }

    /// Encoding applied to the payload
    pub fn encoding(&self) -> PayloadEncoding {
        self.encoding
    }

    /// Encoded bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload as text, for base64-encoded frames
    pub fn as_text(&self) -> Option<&str> {
        match self.encoding {
            PayloadEncoding::Base64 => std::str::from_utf8(&self.payload).ok(),
            PayloadEncoding::Raw => None,
        }
    }
}

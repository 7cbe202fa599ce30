//! Per-subscriber delivery loop
//!
//! Each viewer connection runs [`deliver`] in its own task, so a slow write only
//! ever delays that viewer.

use std::future::Future;

use super::error::RelayError;
use super::frame::EncodedFrame;
use super::subscriber::SubscriberHandle;

/// Transport that writes encoded frames to one viewer
///
/// Implementations own their write timeout and report it as
/// [`RelayError::SendTimeout`].
pub trait FrameSink: Send {
    /// Write one frame
    fn send(&mut self, frame: &EncodedFrame)
        -> impl Future<Output = Result<(), RelayError>> + Send;
}

/// How a delivery loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEnd {
    /// The subscriber was closed (unsubscribed or relay shut down)
    Closed,
    /// A write failed and the subscriber was removed
    Failed(String),
}

/// Forward frames from `handle` to `sink` until either side gives out
///
/// Returns the number of frames written and why the loop stopped. On a write
/// failure the subscriber is unsubscribed before returning.
pub async fn deliver<S: FrameSink>(
    handle: &SubscriberHandle,
    sink: &mut S,
) -> (u64, DeliveryEnd) {
    deliver_after(handle, sink, 0).await
}

/// Like [`deliver`], but skips frames with a sequence at or below `last_sent`
///
/// Used when the transport already sent a catch-up frame before the loop
/// started, so a frame published in between is not written twice.
pub async fn deliver_after<S: FrameSink>(
    handle: &SubscriberHandle,
    sink: &mut S,
    last_sent: u64,
) -> (u64, DeliveryEnd) {
    let mut sent = 0u64;

    while let Some(frame) = handle.recv().await {
        if frame.sequence() != 0 && frame.sequence() <= last_sent {
            continue;
        }
        if let Err(e) = sink.send(&frame).await {
            handle.fail(&e);
            return (sent, DeliveryEnd::Failed(e.to_string()));
        }
        sent += 1;

        tracing::trace!(
            subscriber = %handle.id(),
            sequence = frame.sequence(),
            "Frame delivered"
        );
    }

    (sent, DeliveryEnd::Closed)
}

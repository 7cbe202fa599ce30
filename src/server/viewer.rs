//! WebSocket viewer transport
//!
//! Each viewer connection subscribes to the relay, receives the current frame
//! as catch-up, then gets every published frame until it disconnects or a
//! write fails.
//!
//! Every message is the bare frame payload: a text message holding the base64
//! image, or a binary message holding the raw JPEG. There is no event envelope
//! and no SignalR handshake, so SignalR hub clients cannot connect here.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, StreamExt};

use crate::relay::{
    deliver_after, DeliveryEnd, EncodedFrame, FrameSink, PayloadEncoding, RelayError,
    SubscriberId,
};

use super::routes::AppState;

/// Writes frames to one WebSocket with a per-write timeout
pub(crate) struct WsFrameSink<S = SplitSink<WebSocket, Message>> {
    sender: S,
    subscriber: SubscriberId,
    send_timeout: Duration,
}

impl<S> WsFrameSink<S> {
    pub(crate) fn new(sender: S, subscriber: SubscriberId, send_timeout: Duration) -> Self {
        Self {
            sender,
            subscriber,
            send_timeout,
        }
    }
}

/// Wrap an encoded frame in a message without copying its payload
///
/// Base64 payloads go out as text, raw payloads as binary.
fn frame_message(frame: &EncodedFrame) -> Message {
    let payload = frame.payload().clone();
    match frame.encoding() {
        PayloadEncoding::Base64 => match Utf8Bytes::try_from(payload) {
            Ok(text) => Message::Text(text),
            Err(_) => Message::Binary(frame.payload().clone()),
        },
        PayloadEncoding::Raw => Message::Binary(payload),
    }
}

impl<S> FrameSink for WsFrameSink<S>
where
    S: Sink<Message> + Unpin + Send,
    S::Error: Display,
{
    async fn send(&mut self, frame: &EncodedFrame) -> Result<(), RelayError> {
        let message = frame_message(frame);

        match tokio::time::timeout(self.send_timeout, self.sender.send(message)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RelayError::TransportSendFailure {
                subscriber: self.subscriber,
                reason: e.to_string(),
            }),
            Err(_) => Err(RelayError::SendTimeout {
                subscriber: self.subscriber,
            }),
        }
    }
}

/// Drive one viewer connection to completion
pub(super) async fn serve_viewer(socket: WebSocket, state: AppState) {
    let handle = state.relay.subscribe();
    let id = handle.id();
    let (sender, receiver) = socket.split();
    let mut sink = WsFrameSink::new(sender, id, state.send_timeout);

    // Late joiners get the current frame right away instead of waiting for
    // the camera's next upload
    let mut last_sent = 0;
    if let Some(encoded) = state.relay.catch_up() {
        if let Err(e) = sink.send(&encoded).await {
            handle.fail(&e);
            return;
        }
        last_sent = encoded.sequence();
    }

    tokio::select! {
        (sent, end) = deliver_after(&handle, &mut sink, last_sent) => {
            match end {
                DeliveryEnd::Closed => {
                    tracing::debug!(subscriber = %id, sent = sent, "Viewer subscription closed");
                }
                DeliveryEnd::Failed(reason) => {
                    tracing::info!(
                        subscriber = %id,
                        sent = sent,
                        reason = %reason,
                        "Viewer dropped after send failure"
                    );
                }
            }
        }
        _ = watch_for_close(receiver) => {
            tracing::debug!(subscriber = %id, "Viewer disconnected");
        }
    }

    // Dropping the handle unsubscribes
    drop(handle);
}

/// Read from the viewer until it closes; viewer messages are otherwise ignored
async fn watch_for_close(mut receiver: SplitStream<WebSocket>) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }
}

//! Subscriber mailboxes and handles
//!
//! Each subscriber owns a bounded queue of encoded frames. When the queue is
//! full the oldest entry is discarded, so a slow viewer falls behind by at most
//! `capacity - 1` frames and never holds back the publisher.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::broadcaster::Shared;
use super::error::RelayError;
use super::frame::EncodedFrame;

/// Unique identifier for a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Lifecycle state of a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Created, not yet in the subscriber set
    Connecting,
    /// Receiving published frames
    Active,
    /// Shutting down; no further frames are accepted
    Closing,
    /// Resources released (terminal)
    Closed,
}

/// Result of pushing a frame into a mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PushOutcome {
    /// Queue had room
    Queued,
    /// Queue was full; the oldest frame was discarded
    ReplacedOldest,
    /// Subscriber is closing or closed
    Closed,
}

#[derive(Debug)]
struct MailboxInner {
    queue: VecDeque<EncodedFrame>,
    state: SubscriberState,
    dropped: u64,
}

/// Bounded, drop-oldest delivery queue shared by the broadcaster and a handle
#[derive(Debug)]
pub(super) struct Mailbox {
    id: SubscriberId,
    capacity: usize,
    inner: Mutex<MailboxInner>,
    notify: Notify,
}

impl Mailbox {
    pub(super) fn new(id: SubscriberId, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            id,
            capacity,
            inner: Mutex::new(MailboxInner {
                queue: VecDeque::with_capacity(capacity),
                state: SubscriberState::Connecting,
                dropped: 0,
            }),
            notify: Notify::new(),
        }
    }

    pub(super) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(super) fn state(&self) -> SubscriberState {
        self.inner.lock().state
    }

    /// Connecting -> Active
    pub(super) fn activate(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SubscriberState::Connecting {
            inner.state = SubscriberState::Active;
        }
    }

    pub(super) fn push(&self, frame: &EncodedFrame) -> PushOutcome {
        let mut inner = self.inner.lock();

        if !matches!(
            inner.state,
            SubscriberState::Connecting | SubscriberState::Active
        ) {
            return PushOutcome::Closed;
        }

        let outcome = if inner.queue.len() >= self.capacity {
            inner.queue.pop_front();
            inner.dropped += 1;
            PushOutcome::ReplacedOldest
        } else {
            PushOutcome::Queued
        };
        inner.queue.push_back(frame.clone());
        drop(inner);

        self.notify.notify_one();
        outcome
    }

    fn pop(&self) -> Option<EncodedFrame> {
        let mut inner = self.inner.lock();
        match inner.state {
            SubscriberState::Connecting | SubscriberState::Active => inner.queue.pop_front(),
            SubscriberState::Closing | SubscriberState::Closed => None,
        }
    }

    fn is_closing(&self) -> bool {
        matches!(
            self.inner.lock().state,
            SubscriberState::Closing | SubscriberState::Closed
        )
    }

    /// Stop accepting frames and discard anything still queued
    pub(super) fn begin_close(&self) {
        let mut inner = self.inner.lock();
        if matches!(
            inner.state,
            SubscriberState::Connecting | SubscriberState::Active
        ) {
            inner.state = SubscriberState::Closing;
            inner.queue.clear();
        }
        drop(inner);

        self.notify.notify_one();
    }

    /// Closing -> Closed
    pub(super) fn finish_close(&self) {
        let mut inner = self.inner.lock();
        if inner.state == SubscriberState::Closing {
            inner.state = SubscriberState::Closed;
        }
    }

    pub(super) fn close(&self) {
        self.begin_close();
        self.finish_close();
    }

    fn queued(&self) -> Vec<EncodedFrame> {
        self.inner.lock().queue.iter().cloned().collect()
    }

    fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }
}

/// A subscriber's end of the relay
///
/// Receives published frames and unsubscribes when dropped.
#[derive(Debug)]
pub struct SubscriberHandle {
    mailbox: Arc<Mailbox>,
    shared: Weak<Shared>,
}

impl SubscriberHandle {
    pub(super) fn new(mailbox: Arc<Mailbox>, shared: Weak<Shared>) -> Self {
        Self { mailbox, shared }
    }

    /// Subscriber identifier
    pub fn id(&self) -> SubscriberId {
        self.mailbox.id()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SubscriberState {
        self.mailbox.state()
    }

    /// Wait for the next frame
    ///
    /// Returns `None` once the subscriber is closing or closed. Frames still
    /// queued at that point are discarded.
    pub async fn recv(&self) -> Option<EncodedFrame> {
        loop {
            if let Some(frame) = self.mailbox.pop() {
                return Some(frame);
            }
            if self.mailbox.is_closing() {
                return None;
            }
            // notify_one stores a permit, so a push between pop and here is not lost
            self.mailbox.notify.notified().await;
        }
    }

    /// Take the next frame without waiting
    pub fn try_recv(&self) -> Option<EncodedFrame> {
        self.mailbox.pop()
    }

    /// Frames currently queued, oldest first
    pub fn queued(&self) -> Vec<EncodedFrame> {
        self.mailbox.queued()
    }

    /// Frames discarded by the drop-oldest policy
    pub fn dropped(&self) -> u64 {
        self.mailbox.dropped()
    }

    /// Remove this subscriber from the relay
    ///
    /// Idempotent. Also runs when the handle is dropped.
    pub fn unsubscribe(&self) {
        match self.shared.upgrade() {
            Some(shared) => {
                shared.remove(self.id());
            }
            None => self.mailbox.close(),
        }
    }

    /// Report a failed transport write and unsubscribe
    ///
    /// The failure stays local to this subscriber.
    pub fn fail(&self, error: &RelayError) {
        self.mailbox.begin_close();

        tracing::warn!(
            subscriber = %self.id(),
            error = %error,
            "Subscriber transport failed"
        );

        if let Some(shared) = self.shared.upgrade() {
            shared.stats.record_transport_failure();
            shared.remove(self.id());
        } else {
            self.mailbox.finish_close();
        }
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

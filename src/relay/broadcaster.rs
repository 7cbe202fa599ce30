//! Fan-out of frames to subscribers
//!
//! `publish` encodes a frame once and pushes the shared payload into every
//! subscriber mailbox. It never awaits: a full mailbox drops its oldest frame
//! instead of waiting on the viewer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::stats::RelayStats;

use super::config::RelayConfig;
use super::frame::{EncodedFrame, Frame};
use super::subscriber::{Mailbox, PushOutcome, SubscriberHandle, SubscriberId};

/// State shared between the broadcaster and its handles
#[derive(Debug)]
pub(super) struct Shared {
    subscribers: RwLock<HashMap<SubscriberId, Arc<Mailbox>>>,
    /// Last published frame, reused as catch-up for new viewers
    latest: RwLock<Option<EncodedFrame>>,
    next_id: AtomicU64,
    config: RelayConfig,
    pub(super) stats: Arc<RelayStats>,
}

impl Shared {
    /// Remove a subscriber and release its queue
    ///
    /// Returns false if it was already gone.
    pub(super) fn remove(&self, id: SubscriberId) -> bool {
        let (mailbox, remaining) = {
            let mut subscribers = self.subscribers.write();
            let mailbox = subscribers.remove(&id);
            (mailbox, subscribers.len())
        };

        let Some(mailbox) = mailbox else {
            return false;
        };

        mailbox.close();
        self.stats.subscriber_removed();

        tracing::info!(
            subscriber = %id,
            subscribers = remaining,
            "Subscriber removed"
        );

        true
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Wake any handle still waiting so its recv returns None
        for mailbox in self.subscribers.get_mut().values() {
            mailbox.close();
        }
    }
}

/// Summary of one publish call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Sequence number of the published frame
    pub sequence: u64,
    /// Subscribers the frame was queued for
    pub delivered: usize,
    /// Subscribers whose oldest queued frame was dropped to make room
    pub replaced: usize,
    /// Closed subscribers removed during this publish
    pub pruned: usize,
}

/// Fans frames out to all connected subscribers
///
/// Cloning is cheap and yields another reference to the same subscriber set.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    shared: Arc<Shared>,
}

impl Broadcaster {
    /// Create a broadcaster with default configuration
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    /// Create a broadcaster with custom configuration
    pub fn with_config(config: RelayConfig) -> Self {
        Self::with_stats(config, Arc::new(RelayStats::new()))
    }

    /// Create a broadcaster that reports into existing stats
    pub fn with_stats(config: RelayConfig, stats: Arc<RelayStats>) -> Self {
        Self {
            shared: Arc::new(Shared {
                subscribers: RwLock::new(HashMap::new()),
                latest: RwLock::new(None),
                next_id: AtomicU64::new(1),
                config,
                stats,
            }),
        }
    }

    /// Get the relay configuration
    pub fn config(&self) -> &RelayConfig {
        &self.shared.config
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> SubscriberHandle {
        let id = SubscriberId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let mailbox = Arc::new(Mailbox::new(id, self.shared.config.queue_capacity));

        let count = {
            let mut subscribers = self.shared.subscribers.write();
            subscribers.insert(id, Arc::clone(&mailbox));
            subscribers.len()
        };
        mailbox.activate();
        self.shared.stats.subscriber_added();

        tracing::info!(subscriber = %id, subscribers = count, "Subscriber added");

        SubscriberHandle::new(mailbox, Arc::downgrade(&self.shared))
    }

    /// Remove a subscriber
    ///
    /// Idempotent: returns false if the subscriber was already removed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.shared.remove(id)
    }

    /// Queue a frame for every current subscriber
    ///
    /// Encoding happens once; all mailboxes share the encoded payload.
    pub fn publish(&self, frame: Frame) -> PublishReport {
        let encoded = EncodedFrame::encode(frame, self.shared.config.encoding);
        let mut report = PublishReport {
            sequence: encoded.sequence(),
            ..Default::default()
        };
        let mut closed = Vec::new();

        *self.shared.latest.write() = Some(encoded.clone());

        {
            let subscribers = self.shared.subscribers.read();
            for (id, mailbox) in subscribers.iter() {
                match mailbox.push(&encoded) {
                    PushOutcome::Queued => report.delivered += 1,
                    PushOutcome::ReplacedOldest => {
                        report.delivered += 1;
                        report.replaced += 1;
                    }
                    PushOutcome::Closed => closed.push(*id),
                }
            }
        }

        for id in closed {
            if self.shared.remove(id) {
                report.pruned += 1;
            }
        }

        self.shared.stats.record_dropped(report.replaced as u64);

        tracing::debug!(
            sequence = report.sequence,
            delivered = report.delivered,
            replaced = report.replaced,
            pruned = report.pruned,
            "Frame published"
        );

        report
    }

    /// Last published frame in its encoded form
    pub fn latest(&self) -> Option<EncodedFrame> {
        self.shared.latest.read().clone()
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.read().len()
    }

    /// Check if a subscriber is registered
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.shared.subscribers.read().contains_key(&id)
    }

    /// Stats this broadcaster reports into
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.shared.stats
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio_test::{assert_pending, assert_ready};

    use super::*;
    use crate::relay::config::PayloadEncoding;
    use crate::relay::error::RelayError;
    use crate::relay::subscriber::SubscriberState;

    fn raw_broadcaster() -> Broadcaster {
        Broadcaster::with_config(RelayConfig::default().encoding(PayloadEncoding::Raw))
    }

    fn frame(data: &'static [u8]) -> Frame {
        Frame::new(Bytes::from_static(data)).unwrap()
    }

    fn payloads(handle: &SubscriberHandle) -> Vec<Bytes> {
        handle.queued().iter().map(|f| f.payload().clone()).collect()
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let broadcaster = Broadcaster::new();

        let handle = broadcaster.subscribe();
        assert_eq!(handle.state(), SubscriberState::Active);
        assert_eq!(broadcaster.subscriber_count(), 1);

        assert!(broadcaster.unsubscribe(handle.id()));
        assert!(!broadcaster.unsubscribe(handle.id()));
        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(handle.state(), SubscriberState::Closed);
    }

    #[test]
    fn test_unique_ids() {
        let broadcaster = Broadcaster::new();
        let a = broadcaster.subscribe();
        let b = broadcaster.subscribe();

        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_handle_drop_unsubscribes() {
        let broadcaster = Broadcaster::new();
        let handle = broadcaster.subscribe();
        let id = handle.id();

        drop(handle);

        assert!(!broadcaster.contains(id));
        assert_eq!(broadcaster.stats().snapshot().subscribers_active, 0);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = Broadcaster::new();

        let report = broadcaster.publish(frame(b"x"));
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test]
    async fn test_late_subscriber_only_sees_new_frames() {
        let broadcaster = raw_broadcaster();
        let s1 = broadcaster.subscribe();

        broadcaster.publish(frame(&[0xFF, 0xD8, 0xFF, 0xE0]));
        let a = s1.recv().await.unwrap();
        assert_eq!(a.payload().as_ref(), &[0xFF, 0xD8, 0xFF, 0xE0]);

        let s2 = broadcaster.subscribe();
        let report = broadcaster.publish(frame(b"B"));
        assert_eq!(report.delivered, 2);

        assert_eq!(s1.recv().await.unwrap().payload().as_ref(), b"B");
        assert_eq!(s2.recv().await.unwrap().payload().as_ref(), b"B");
        assert!(s1.try_recv().is_none());
        assert!(s2.try_recv().is_none());
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let broadcaster = Broadcaster::with_config(
            RelayConfig::default()
                .queue_capacity(2)
                .encoding(PayloadEncoding::Raw),
        );
        let s1 = broadcaster.subscribe();

        broadcaster.publish(frame(b"A"));
        broadcaster.publish(frame(b"B"));
        let report = broadcaster.publish(frame(b"C"));

        assert_eq!(report.replaced, 1);
        assert_eq!(
            payloads(&s1),
            vec![Bytes::from_static(b"B"), Bytes::from_static(b"C")]
        );
        assert_eq!(s1.dropped(), 1);
        assert_eq!(broadcaster.stats().snapshot().frames_dropped, 1);
    }

    #[test]
    fn test_slow_subscriber_does_not_affect_others() {
        let broadcaster = raw_broadcaster();
        let slow = broadcaster.subscribe();
        let fast = broadcaster.subscribe();

        for data in [b"1", b"2", b"3", b"4"] {
            broadcaster.publish(frame(data));
            assert_eq!(fast.try_recv().unwrap().payload().as_ref(), data);
        }

        assert_eq!(
            payloads(&slow),
            vec![Bytes::from_static(b"3"), Bytes::from_static(b"4")]
        );
    }

    #[test]
    fn test_failed_subscriber_removed() {
        let broadcaster = raw_broadcaster();
        let healthy = broadcaster.subscribe();
        let broken = broadcaster.subscribe();
        broadcaster.publish(frame(b"A"));

        broken.fail(&RelayError::TransportSendFailure {
            subscriber: broken.id(),
            reason: "connection reset".into(),
        });

        assert!(!broadcaster.contains(broken.id()));
        assert_eq!(broken.state(), SubscriberState::Closed);
        assert!(broken.try_recv().is_none());

        let report = broadcaster.publish(frame(b"B"));
        assert_eq!(report.delivered, 1);
        assert!(broken.try_recv().is_none());
        assert_eq!(payloads(&healthy).len(), 2);
        assert_eq!(broadcaster.stats().snapshot().transport_failures, 1);
    }

    #[test]
    fn test_publish_prunes_closing_subscriber() {
        let broadcaster = raw_broadcaster();
        let healthy = broadcaster.subscribe();
        let closing = broadcaster.subscribe();

        let mailbox = broadcaster.shared.subscribers.read()[&closing.id()].clone();
        mailbox.begin_close();

        let report = broadcaster.publish(frame(b"A"));

        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, 1);
        assert!(!broadcaster.contains(closing.id()));
        assert_eq!(closing.state(), SubscriberState::Closed);
        assert_eq!(payloads(&healthy), vec![Bytes::from_static(b"A")]);
        assert_eq!(broadcaster.stats().snapshot().subscribers_active, 1);

        let report = broadcaster.publish(frame(b"B"));
        assert_eq!(report.pruned, 0);
    }

    #[test]
    fn test_latest_is_shared_with_subscribers() {
        let broadcaster = Broadcaster::new();
        assert!(broadcaster.latest().is_none());

        let handle = broadcaster.subscribe();
        broadcaster.publish(frame(&[0xFF, 0xD8, 0xFF, 0xE0]));

        let latest = broadcaster.latest().unwrap();
        let queued = handle.try_recv().unwrap();
        assert_eq!(latest.sequence(), queued.sequence());
        assert_eq!(latest.payload().as_ptr(), queued.payload().as_ptr());
    }

    #[tokio::test]
    async fn test_recv_wakes_on_publish() {
        let broadcaster = raw_broadcaster();
        let handle = broadcaster.subscribe();

        let mut recv = tokio_test::task::spawn(handle.recv());
        assert_pending!(recv.poll());

        broadcaster.publish(frame(b"wake"));

        assert!(recv.is_woken());
        let received = assert_ready!(recv.poll()).unwrap();
        assert_eq!(received.payload().as_ref(), b"wake");
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_unsubscribe() {
        let broadcaster = raw_broadcaster();
        let handle = broadcaster.subscribe();
        broadcaster.publish(frame(b"pending"));

        broadcaster.unsubscribe(handle.id());

        assert!(handle.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_recv_returns_none_when_broadcaster_dropped() {
        let broadcaster = raw_broadcaster();
        let handle = broadcaster.subscribe();

        let mut recv = tokio_test::task::spawn(handle.recv());
        assert_pending!(recv.poll());

        drop(broadcaster);

        assert!(recv.is_woken());
        assert!(assert_ready!(recv.poll()).is_none());
    }

    #[test]
    fn test_encoded_once_and_shared() {
        let broadcaster = Broadcaster::new();
        let s1 = broadcaster.subscribe();
        let s2 = broadcaster.subscribe();

        broadcaster.publish(frame(&[0xFF, 0xD8, 0xFF, 0xE0]));

        let a = s1.try_recv().unwrap();
        let b = s2.try_recv().unwrap();
        assert_eq!(a.as_text(), Some("/9j/4A=="));
        assert_eq!(a.payload().as_ptr(), b.payload().as_ptr());
    }

    #[test]
    fn test_frames_arrive_in_publish_order() {
        let broadcaster = Broadcaster::with_config(
            RelayConfig::default()
                .queue_capacity(3)
                .encoding(PayloadEncoding::Raw),
        );
        let store = crate::relay::FrameStore::new();
        let handle = broadcaster.subscribe();

        for i in 0..10u8 {
            broadcaster.publish(store.replace(vec![i]).unwrap());
        }

        let sequences: Vec<u64> = handle.queued().iter().map(|f| f.sequence()).collect();
        assert_eq!(sequences, vec![8, 9, 10]);
    }
}

//! Ingest pipeline
//!
//! Bundles one [`FrameStore`] and one [`Broadcaster`] so the ingest path can
//! store and fan out a frame in a single call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::stats::RelayStats;

use super::broadcaster::{Broadcaster, PublishReport};
use super::config::RelayConfig;
use super::error::RelayError;
use super::frame::{EncodedFrame, Frame};
use super::store::FrameStore;
use super::subscriber::SubscriberHandle;

/// Latest-frame store plus broadcaster, owned once per process
pub struct Relay {
    store: FrameStore,
    broadcaster: Broadcaster,
    stats: Arc<RelayStats>,
    /// Keeps replace and publish in the same order across concurrent ingests
    ingest_lock: Mutex<()>,
    /// Set once the monitor has logged the current stale period
    stale_reported: AtomicBool,
}

impl Relay {
    /// Create a relay with default configuration
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    /// Create a relay with custom configuration
    pub fn with_config(config: RelayConfig) -> Self {
        let stats = Arc::new(RelayStats::new());
        Self {
            store: FrameStore::with_config(&config),
            broadcaster: Broadcaster::with_stats(config, Arc::clone(&stats)),
            stats,
            ingest_lock: Mutex::new(()),
            stale_reported: AtomicBool::new(false),
        }
    }

    /// Store a frame and publish it to all subscribers
    ///
    /// Invalid input is rejected before anything is published.
    pub fn ingest(&self, data: impl Into<Bytes>) -> Result<PublishReport, RelayError> {
        let _guard = self.ingest_lock.lock();

        let frame = self.store.replace(data).inspect_err(|_| {
            self.stats.record_rejected();
        })?;
        self.stats.record_frame(frame.len());

        Ok(self.broadcaster.publish(frame))
    }

    /// Latest non-stale frame
    pub fn snapshot(&self) -> Option<Frame> {
        self.store.snapshot()
    }

    /// Current frame for a newly connected viewer, already encoded
    ///
    /// Reuses the payload built at publish time. `None` when nothing is held,
    /// the frame is stale, or an ingest has stored a frame it has not yet
    /// published (a subscriber registered beforehand still gets that frame
    /// from its queue).
    pub fn catch_up(&self) -> Option<EncodedFrame> {
        let current = self.store.snapshot()?;
        self.broadcaster
            .latest()
            .filter(|encoded| encoded.sequence() == current.sequence())
    }

    /// Register a viewer
    pub fn subscribe(&self) -> SubscriberHandle {
        self.broadcaster.subscribe()
    }

    /// Check the store once and log transitions between live and stale
    ///
    /// Returns true while the stream is stale.
    pub fn check_staleness(&self) -> bool {
        let stale = self.store.is_stale();
        let was_reported = self.stale_reported.swap(stale, Ordering::Relaxed);

        if stale && !was_reported {
            tracing::warn!(
                age_ms = self
                    .store
                    .last_frame_age()
                    .map(|age| age.as_millis() as u64)
                    .unwrap_or_default(),
                threshold_secs = self.store.staleness_threshold().as_secs(),
                "Camera stream went stale"
            );
        } else if !stale && was_reported {
            tracing::info!("Camera stream resumed");
        }

        stale
    }

    /// Spawn background staleness monitor
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_staleness_monitor(
        self: &Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let relay = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                relay.check_staleness();
            }
        })
    }

    /// Get the frame store
    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Get the broadcaster
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Get the relay statistics
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}

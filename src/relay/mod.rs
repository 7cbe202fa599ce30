//! Frame relay: latest-frame store and subscriber fan-out
//!
//! The relay receives frames from a single camera and hands each one to every
//! connected viewer. Delivery is decoupled from ingest through a bounded
//! mailbox per subscriber.
//!
//! # Architecture
//!
//! ```text
//!                              Relay
//!                 ┌─────────────────────────────────┐
//!  camera ──────► │ FrameStore   (latest frame)     │
//!  POST frame     │      │                          │
//!                 │      ▼                          │
//!                 │ Broadcaster  (encode once)      │
//!                 │   subscribers: HashMap<Id,      │
//!                 │     Mailbox { VecDeque, K }>    │
//!                 └──────┬──────────┬──────────┬────┘
//!                        ▼          ▼          ▼
//!                    [Mailbox]  [Mailbox]  [Mailbox]
//!                        │          │          │
//!                    deliver()  deliver()  deliver()   one task per viewer
//!                        ▼          ▼          ▼
//!                    FrameSink  FrameSink  FrameSink   (WebSocket, ...)
//! ```
//!
//! # Backpressure
//!
//! A mailbox holds at most K frames (2 by default). Publishing into a full
//! mailbox discards its oldest frame, so a viewer that stalls only ever loses
//! stale frames and the publisher never waits. A viewer whose transport fails
//! is removed and gets nothing further.
//!
//! # Zero-Copy Design
//!
//! Frames are `bytes::Bytes`, and the encoded payload is built once per publish
//! and shared by reference count across all mailboxes.

pub mod broadcaster;
pub mod config;
pub mod delivery;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod store;
pub mod subscriber;

pub use broadcaster::{Broadcaster, PublishReport};
pub use config::{PayloadEncoding, RelayConfig};
pub use delivery::{deliver, deliver_after, DeliveryEnd, FrameSink};
pub use error::RelayError;
pub use frame::{EncodedFrame, Frame};
pub use pipeline::Relay;
pub use store::FrameStore;
pub use subscriber::{SubscriberHandle, SubscriberId, SubscriberState};

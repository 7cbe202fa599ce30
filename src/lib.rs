//! # frame-relay
//!
//! Relays still frames pushed by a network camera to any number of live
//! viewers.
//!
//! The camera uploads one JPEG per request. Each upload replaces the latest
//! frame in a [`FrameStore`](relay::FrameStore) and is fanned out by a
//! [`Broadcaster`](relay::Broadcaster) into a small per-viewer mailbox. A slow
//! viewer loses stale frames instead of slowing down the camera or other
//! viewers.
//!
//! ```no_run
//! use frame_relay::{RelayServer, ServerConfig};
//!
//! # async fn run() -> frame_relay::Result<()> {
//! let config = ServerConfig::from_env()?;
//! let server = RelayServer::new(config)?;
//! server.run().await
//! # }
//! ```
//!
//! The core can also be used without the HTTP layer:
//!
//! ```
//! use frame_relay::relay::{PayloadEncoding, Relay, RelayConfig};
//!
//! let relay = Relay::with_config(RelayConfig::default().encoding(PayloadEncoding::Raw));
//! let viewer = relay.subscribe();
//!
//! relay.ingest(vec![0xFFu8, 0xD8, 0xFF, 0xE0]).unwrap();
//!
//! let frame = viewer.try_recv().unwrap();
//! assert_eq!(frame.payload().as_ref(), &[0xFF, 0xD8, 0xFF, 0xE0]);
//! ```

pub mod error;
pub mod relay;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use relay::{Broadcaster, Frame, FrameStore, Relay, RelayConfig, SubscriberHandle};
pub use server::{RelayServer, ServerConfig};

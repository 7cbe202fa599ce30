//! HTTP ingest and WebSocket viewer server
//!
//! A thin layer over [`Relay`](crate::relay::Relay): the camera uploads frames
//! with `POST /api/camera/stream` and viewers receive them over `/cameraHub`.

pub mod auth;
pub mod config;
pub mod listener;
pub mod routes;
mod viewer;

pub use auth::UploadAuth;
pub use config::ServerConfig;
pub use listener::RelayServer;
pub use routes::IngestError;

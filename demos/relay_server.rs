//! Frame relay server
//!
//! Run with: cargo run --example relay_server
//!
//! Configuration comes from the environment:
//!
//!   FRAME_RELAY_TOKEN=secret            upload token (required unless
//!                                       FRAME_RELAY_ALLOW_UNAUTHENTICATED=true)
//!   FRAME_RELAY_BIND=0.0.0.0:5001       listen address
//!   FRAME_RELAY_QUEUE_CAPACITY=2        frames buffered per viewer
//!   FRAME_RELAY_STALE_SECS=10           age after which the stream counts as offline
//!   FRAME_RELAY_SEND_TIMEOUT_MS=5000    per-write timeout for viewers
//!   RUST_LOG=frame_relay=debug          log filter
//!
//! ## Uploading (camera side)
//!
//!   curl -X POST -H "Authorization: Bearer secret" -H "Content-Type: image/jpeg" \
//!        --data-binary @frame.jpg http://localhost:5001/api/camera/stream
//!
//! ## Viewing
//!
//!   websocat ws://localhost:5001/cameraHub      # one base64 JPEG per message
//!   curl -o latest.jpg http://localhost:5001/api/camera/latest

use frame_relay::{RelayServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("frame_relay=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let server = RelayServer::new(config)?;

    println!("Frame relay starting on {}", server.bind_addr());
    println!("Press Ctrl+C to stop");

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let stats = server.relay().stats().snapshot();
    println!(
        "Relayed {} frames ({} bytes), dropped {} stale frames, {} viewers served",
        stats.frames_received, stats.bytes_received, stats.frames_dropped, stats.subscribers_total
    );

    Ok(())
}

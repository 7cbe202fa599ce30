//! Relay server listener
//!
//! Binds the TCP listener and serves the HTTP/WebSocket router.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::Result;
use crate::relay::Relay;
use crate::server::config::ServerConfig;
use crate::server::routes;

/// Frame relay server
pub struct RelayServer {
    config: ServerConfig,
    relay: Arc<Relay>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    ///
    /// Fails if the configuration would accept uploads without a token and
    /// that was not explicitly allowed.
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        if config.auth_token.is_none() {
            tracing::warn!("Upload authentication disabled; any client may publish frames");
        }

        let relay = Arc::new(Relay::with_config(config.relay.clone()));

        Ok(Self { config, relay })
    }

    /// Get a reference to the relay
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Build the router, for serving on a custom listener or in-process tests
    pub fn router(&self) -> Router {
        routes::router(Arc::clone(&self.relay), &self.config)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            queue_capacity = self.config.relay.queue_capacity,
            stale_after_secs = self.config.relay.staleness_threshold.as_secs(),
            "Frame relay listening"
        );

        // Check twice per threshold so a stale stream is reported promptly
        let monitor_interval =
            (self.config.relay.staleness_threshold / 2).max(Duration::from_millis(100));
        let monitor = self.relay.spawn_staleness_monitor(monitor_interval);

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        monitor.abort();

        result?;
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

//! Server configuration

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::relay::RelayConfig;

/// Environment variable names read by [`ServerConfig::from_env`]
pub mod env {
    pub const BIND: &str = "FRAME_RELAY_BIND";
    pub const TOKEN: &str = "FRAME_RELAY_TOKEN";
    pub const ALLOW_UNAUTHENTICATED: &str = "FRAME_RELAY_ALLOW_UNAUTHENTICATED";
    pub const QUEUE_CAPACITY: &str = "FRAME_RELAY_QUEUE_CAPACITY";
    pub const STALE_SECS: &str = "FRAME_RELAY_STALE_SECS";
    pub const SEND_TIMEOUT_MS: &str = "FRAME_RELAY_SEND_TIMEOUT_MS";
    pub const MAX_FRAME_BYTES: &str = "FRAME_RELAY_MAX_FRAME_BYTES";
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Token the camera must present on upload
    pub auth_token: Option<String>,

    /// Accept uploads without a token (only honored when no token is set)
    pub allow_unauthenticated: bool,

    /// Timeout for a single write to a viewer
    pub send_timeout: Duration,

    /// Allow cross-origin requests from any origin
    pub cors_any_origin: bool,

    /// Frame store and broadcaster settings
    pub relay: RelayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5001)),
            auth_token: None,
            allow_unauthenticated: false,
            send_timeout: Duration::from_secs(5),
            cors_any_origin: true,
            relay: RelayConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build a config from `FRAME_RELAY_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    ///
    /// Unset keys keep their defaults; malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = parse_var(&lookup, env::BIND)? {
            config.bind_addr = addr;
        }
        if let Some(token) = lookup(env::TOKEN).filter(|t| !t.trim().is_empty()) {
            config.auth_token = Some(token.trim().to_string());
        }
        if let Some(allow) = parse_var(&lookup, env::ALLOW_UNAUTHENTICATED)? {
            config.allow_unauthenticated = allow;
        }
        if let Some(capacity) = parse_var(&lookup, env::QUEUE_CAPACITY)? {
            config.relay = config.relay.queue_capacity(capacity);
        }
        if let Some(secs) = parse_var(&lookup, env::STALE_SECS)? {
            config.relay = config.relay.staleness_threshold(Duration::from_secs(secs));
        }
        if let Some(ms) = parse_var(&lookup, env::SEND_TIMEOUT_MS)? {
            config.send_timeout = Duration::from_millis(ms);
        }
        if let Some(bytes) = parse_var(&lookup, env::MAX_FRAME_BYTES)? {
            config.relay = config.relay.max_frame_size(bytes);
        }

        Ok(config)
    }

    /// Check the config is safe to serve with
    pub fn validate(&self) -> Result<()> {
        if self.auth_token.is_none() && !self.allow_unauthenticated {
            return Err(Error::Config(format!(
                "no upload token configured; set {} or {}=true",
                env::TOKEN,
                env::ALLOW_UNAUTHENTICATED
            )));
        }
        if self.send_timeout.is_zero() {
            return Err(Error::Config("send timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Require this token on uploads
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Accept uploads without a token
    pub fn allow_unauthenticated(mut self) -> Self {
        self.allow_unauthenticated = true;
        self
    }

    /// Set the per-write timeout for viewers
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Disable the allow-any-origin CORS layer
    pub fn disable_cors(mut self) -> Self {
        self.cors_any_origin = false;
        self
    }

    /// Set the relay configuration
    pub fn relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid {key}={raw:?}: {e}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 5001);
        assert!(config.auth_token.is_none());
        assert!(!config.allow_unauthenticated);
        assert_eq!(config.send_timeout, Duration::from_secs(5));
        assert!(config.cors_any_origin);
    }

    #[test]
    fn test_default_config_requires_token() {
        assert!(matches!(
            ServerConfig::default().validate(),
            Err(Error::Config(_))
        ));
        assert!(ServerConfig::default().auth_token("secret").validate().is_ok());
        assert!(ServerConfig::default()
            .allow_unauthenticated()
            .validate()
            .is_ok());
    }

    #[test]
    fn test_zero_send_timeout_rejected() {
        let config = ServerConfig::default()
            .auth_token("secret")
            .send_timeout(Duration::ZERO);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = ServerConfig::from_lookup(lookup(&[
            (env::BIND, "127.0.0.1:8080"),
            (env::TOKEN, " camera-secret "),
            (env::QUEUE_CAPACITY, "3"),
            (env::STALE_SECS, "30"),
            (env::SEND_TIMEOUT_MS, "250"),
            (env::MAX_FRAME_BYTES, "1024"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.auth_token.as_deref(), Some("camera-secret"));
        assert_eq!(config.relay.queue_capacity, 3);
        assert_eq!(config.relay.staleness_threshold, Duration::from_secs(30));
        assert_eq!(config.send_timeout, Duration::from_millis(250));
        assert_eq!(config.relay.max_frame_size, 1024);
    }

    #[test]
    fn test_from_lookup_empty_token_ignored() {
        let config = ServerConfig::from_lookup(lookup(&[(env::TOKEN, "  ")])).unwrap();

        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_from_lookup_malformed() {
        let result = ServerConfig::from_lookup(lookup(&[(env::QUEUE_CAPACITY, "two")]));

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:5002".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .auth_token("t")
            .send_timeout(Duration::from_secs(1))
            .disable_cors()
            .relay(RelayConfig::default().queue_capacity(5));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.auth_token.as_deref(), Some("t"));
        assert_eq!(config.send_timeout, Duration::from_secs(1));
        assert!(!config.cors_any_origin);
        assert_eq!(config.relay.queue_capacity, 5);
    }
}

//! # Configuration Management
//!
//! Loads application configuration from multiple sources, highest
//! priority first:
//!
//! 1. Environment variables (`APP_SERVER_HOST`, `APP_WEBSOCKET_MAX_FRAME_BYTES`, ...)
//! 2. Configuration file (`config.toml`, optional)
//! 3. Built-in defaults
//!
//! `HOST` and `PORT` are honored as deployment-platform overrides outside
//! the `APP_` convention.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub websocket: WebSocketConfig,
    pub codec: CodecConfig,
}

/// Bind address for the HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Limits and timers for the `/ws/audio` streaming endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// Largest accepted binary frame in bytes; oversized frames close the
    /// connection with close code 1009.
    pub max_frame_bytes: usize,

    /// How often the server pings idle clients.
    pub heartbeat_interval_secs: u64,

    /// How long a silent client may stay connected before the server
    /// closes the session.
    pub idle_timeout_secs: u64,
}

/// Codec selection defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Server-side default backend applied when a connection carries no
    /// `codec` query parameter. Empty means "best available". Unknown or
    /// unavailable names fall back silently, same as client requests.
    pub default_backend: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            websocket: WebSocketConfig {
                max_frame_bytes: 1_048_576, // 1 MiB
                heartbeat_interval_secs: 30,
                idle_timeout_secs: 300,
            },
            codec: CodecConfig {
                default_backend: String::new(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, then `config.toml`, then the
    /// environment.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Deployment platforms commonly inject these without the APP_ prefix.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject configurations that cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.websocket.max_frame_bytes == 0 {
            return Err(anyhow::anyhow!("Max frame size must be greater than 0"));
        }

        if self.websocket.heartbeat_interval_secs == 0 {
            return Err(anyhow::anyhow!("Heartbeat interval must be greater than 0"));
        }

        if self.websocket.idle_timeout_secs <= self.websocket.heartbeat_interval_secs {
            return Err(anyhow::anyhow!(
                "Idle timeout must be longer than the heartbeat interval"
            ));
        }

        Ok(())
    }

    /// The configured default backend request, if any.
    pub fn default_backend(&self) -> Option<&str> {
        let name = self.codec.default_backend.trim();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Apply a partial update from a JSON document. Only fields present in
    /// the document change; the result is validated before taking effect.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;
            }
        }

        if let Some(websocket) = partial.get("websocket") {
            if let Some(max) = websocket.get("max_frame_bytes").and_then(|v| v.as_u64()) {
                self.websocket.max_frame_bytes = max as usize;
            }
            if let Some(interval) = websocket
                .get("heartbeat_interval_secs")
                .and_then(|v| v.as_u64())
            {
                self.websocket.heartbeat_interval_secs = interval;
            }
            if let Some(timeout) = websocket.get("idle_timeout_secs").and_then(|v| v.as_u64()) {
                self.websocket.idle_timeout_secs = timeout;
            }
        }

        if let Some(codec) = partial.get("codec") {
            if let Some(backend) = codec.get("default_backend").and_then(|v| v.as_str()) {
                self.codec.default_backend = backend.to_string();
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.websocket.max_frame_bytes, 1_048_576);
        assert!(config.default_backend().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.websocket.max_frame_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.websocket.idle_timeout_secs = config.websocket.heartbeat_interval_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"server": {"port": 9090}, "codec": {"default_backend": "vectorized"}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.default_backend(), Some("vectorized"));
        // Untouched fields keep their values.
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.websocket.idle_timeout_secs, 300);
    }

    #[test]
    fn test_invalid_update_is_rejected() {
        let mut config = AppConfig::default();
        let json = r#"{"websocket": {"max_frame_bytes": 0}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}

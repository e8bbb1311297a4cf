//! Server configuration, loaded from TOML.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```toml
//! bind = "0.0.0.0:9000"
//! worker_threads = 4
//!
//! [logging]
//! level = "debug"
//!
//! [engine.tick]
//! tick_rate_hz = 30
//!
//! [engine.sim]
//! win_score = 11
//! ```

use std::path::Path;
use std::time::Duration;

use rally_room::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::RallyError;

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset (`trace`..`error`, or a full
    /// `EnvFilter` directive).
    pub level: String,
    /// One JSON object per line instead of human-readable output.
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Everything the `rally-server` binary needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,
    /// How long a new connection has to send its `JOIN` frame.
    pub handshake_timeout_ms: u64,
    /// A joined connection that sends nothing for this long is closed.
    /// `0` disables the check.
    pub idle_timeout_ms: u64,
    /// A single socket write that takes longer than this closes the
    /// connection.
    pub write_timeout_ms: u64,
    /// Inbound frames larger than this drop the connection.
    pub max_frame_bytes: usize,
    /// Runtime worker threads; `None` lets Tokio pick one per core.
    pub worker_threads: Option<usize>,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            handshake_timeout_ms: 5_000,
            idle_timeout_ms: 60_000,
            write_timeout_ms: 2_000,
            max_frame_bytes: rally_transport::DEFAULT_MAX_FRAME_BYTES,
            worker_threads: None,
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, RallyError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, RallyError> {
        let text = std::fs::read_to_string(path).map_err(|source| RallyError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// `None` when the idle check is disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rally_tick::TickPolicy;

    #[test]
    fn test_empty_document_is_default() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_partial_document_overrides_only_what_it_names() {
        let config = ServerConfig::from_toml_str(
            r#"
            bind = "0.0.0.0:9000"
            worker_threads = 4
            idle_timeout_ms = 0
            max_frame_bytes = 4096

            [logging]
            json_format = true

            [engine]
            outbound_queue = 16

            [engine.tick]
            tick_rate_hz = 30

            [engine.sim]
            win_score = 11
            "#,
        )
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.worker_threads, Some(4));
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.max_frame_bytes, 4096);
        assert!(config.logging.json_format);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.engine.outbound_queue, 16);
        assert_eq!(config.engine.tick.tick_rate_hz, 30);
        assert_eq!(config.engine.tick.policy, TickPolicy::default());
        assert_eq!(config.engine.sim.win_score, 11);
        assert_eq!(config.engine.sim.width, 800.0);
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_wrong_type_is_config_error() {
        let result = ServerConfig::from_toml_str("handshake_timeout_ms = \"soon\"");
        assert!(matches!(result, Err(RallyError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = ServerConfig::load(Path::new("/definitely/not/here/rally.toml"));
        assert!(matches!(result, Err(RallyError::ConfigRead { .. })));
    }

    #[test]
    fn test_idle_timeout_enabled_by_default() {
        assert_eq!(
            ServerConfig::default().idle_timeout(),
            Some(Duration::from_secs(60))
        );
    }
}

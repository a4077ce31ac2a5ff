//! TOML-based configuration for the relay.
//!
//! By default the file is read from the platform config directory:
//! - Windows:  `%APPDATA%\clipshare\relay.toml`
//! - Linux:    `~/.config/clipshare/relay.toml`
//! - macOS:    `~/Library/Application Support/clipshare/relay.toml`
//!
//! Example:
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 1337
//! log_level = "info"
//!
//! [limits]
//! inbound_queue_capacity = 64
//! max_concurrent_updates = 256
//! write_timeout_ms = 5000
//! ```
//!
//! Every field has a default, so a missing file, a missing section, or a
//! missing key all fall back to the values above.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::hub::{
    HubConfig, DEFAULT_INBOUND_QUEUE_CAPACITY, DEFAULT_MAX_CONCURRENT_UPDATES,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    /// A limit is outside its valid range.
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Listener and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// IP address to bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port peers connect to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Resource bounds for the broadcast core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitsConfig {
    /// Bound of the shared inbound update channel.
    #[serde(default = "default_inbound_queue_capacity")]
    pub inbound_queue_capacity: usize,
    /// Client writes allowed in flight during one broadcast.
    #[serde(default = "default_max_concurrent_updates")]
    pub max_concurrent_updates: usize,
    /// Deadline for a single write to a peer; a peer that misses it is
    /// dropped.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    1337
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_inbound_queue_capacity() -> usize {
    DEFAULT_INBOUND_QUEUE_CAPACITY
}
fn default_max_concurrent_updates() -> usize {
    DEFAULT_MAX_CONCURRENT_UPDATES
}
fn default_write_timeout_ms() -> u64 {
    5_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            inbound_queue_capacity: default_inbound_queue_capacity(),
            max_concurrent_updates: default_max_concurrent_updates(),
            write_timeout_ms: default_write_timeout_ms(),
        }
    }
}

impl RelayConfig {
    /// Checks values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] or
    /// [`ConfigError::InvalidLimit`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;
        if self.limits.inbound_queue_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "inbound_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.limits.max_concurrent_updates == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_concurrent_updates must be at least 1".to_string(),
            ));
        }
        if self.limits.write_timeout_ms == 0 {
            return Err(ConfigError::InvalidLimit(
                "write_timeout_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The socket address the listener binds to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind_address` is not
    /// an IP address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.server.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            inbound_queue_capacity: self.limits.inbound_queue_capacity,
            max_concurrent_updates: self.limits.max_concurrent_updates,
        }
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.limits.write_timeout_ms)
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Resolves the default path of the relay config file, if the platform
/// config directory can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    platform_config_dir().map(|dir| dir.join("relay.toml"))
}

/// Loads `RelayConfig` from `path`, returning `RelayConfig::default()` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RelayConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("clipshare"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("clipshare"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("clipshare")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_default_config_listens_on_port_1337_all_interfaces() {
        // Arrange / Act
        let cfg = RelayConfig::default();

        // Assert
        assert_eq!(cfg.listen_addr().unwrap().to_string(), "0.0.0.0:1337");
        assert_eq!(cfg.server.log_level, "info");
    }

    #[test]
    fn test_default_limits_match_hub_defaults() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.hub_config(), HubConfig::default());
        assert_eq!(cfg.write_timeout(), Duration::from_secs(5));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: RelayConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_given_keys() {
        // Arrange
        let toml_str = r#"
[server]
port = 9999
[limits]
write_timeout_ms = 250
"#;

        // Act
        let cfg: RelayConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.server.port, 9999);
        assert_eq!(cfg.server.bind_address, "0.0.0.0");
        assert_eq!(cfg.write_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.limits.inbound_queue_capacity, DEFAULT_INBOUND_QUEUE_CAPACITY);
    }

    #[test]
    fn test_serializes_and_deserializes_round_trip() {
        let mut cfg = RelayConfig::default();
        cfg.server.bind_address = "127.0.0.1".to_string();
        cfg.limits.max_concurrent_updates = 8;

        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: RelayConfig = toml::from_str(&toml_str).expect("deserialize");

        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_invalid_bind_address_fails_validation() {
        let mut cfg = RelayConfig::default();
        cfg.server.bind_address = "not.an.ip".to_string();

        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidBindAddress(_))));
    }

    #[test]
    fn test_zero_queue_capacity_fails_validation() {
        let mut cfg = RelayConfig::default();
        cfg.limits.inbound_queue_capacity = 0;

        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidLimit(_))));
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/relay.toml");

        let cfg = load_config(&path).expect("absent file is not an error");

        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn test_load_config_reads_file_from_disk() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("clip_relay_test_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("relay.toml");
        std::fs::write(&path, "[server]\nport = 4242\nlog_level = \"debug\"\n").unwrap();

        // Act
        let cfg = load_config(&path).unwrap();

        // Assert
        assert_eq!(cfg.server.port, 4242);
        assert_eq!(cfg.server.log_level, "debug");

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_reports_malformed_toml() {
        let dir = std::env::temp_dir().join(format!("clip_relay_test_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("relay.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_default_config_path_ends_with_relay_toml() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("relay.toml"), "got {path:?}");
        }
    }
}

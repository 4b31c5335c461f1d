//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `CHATHUB_*` environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::hub::HubConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub websocket: WebSocketConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest recipient list accepted by the publish endpoint
    #[serde(default = "default_max_publish_recipients")]
    pub max_publish_recipients: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_publish_recipients() -> usize {
    10_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_publish_recipients: default_max_publish_recipients(),
        }
    }
}

/// WebSocket transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Largest inbound frame accepted from a client (bytes)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,

    /// Upper bound on recipients a client may address in one relayed event
    #[serde(default = "default_max_relay_recipients")]
    pub max_relay_recipients: usize,
}

fn default_max_message_size() -> usize {
    512 * 1024
}

fn default_write_buffer_size() -> usize {
    1024
}

fn default_max_relay_recipients() -> usize {
    256
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            write_buffer_size: default_write_buffer_size(),
            max_relay_recipients: default_max_relay_recipients(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Outcome of searching a list of config locations
#[derive(Debug)]
pub struct LoadReport {
    pub config: Config,

    /// File the config came from; `None` when defaults were used
    pub source: Option<PathBuf>,

    /// Files that exist but could not be loaded, in search order
    pub failures: Vec<ConfigError>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Standard config locations, in search order
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("chathub").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/chathub/config.toml"));
        paths.push(PathBuf::from("./config.toml"));
        paths
    }

    /// Load from default locations or environment
    pub fn load_default() -> LoadReport {
        Self::load_first(&Self::default_paths())
    }

    /// Load the first file in `paths` that exists and is valid. Files that
    /// exist but fail are recorded and skipped. Falls back to defaults with
    /// environment overrides.
    pub fn load_first(paths: &[PathBuf]) -> LoadReport {
        let mut failures = Vec::new();

        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    return LoadReport {
                        config,
                        source: Some(path.clone()),
                        failures,
                    }
                }
                Err(e) => failures.push(e),
            }
        }

        LoadReport {
            config: Self::from_env(),
            source: None,
            failures,
        }
    }

    /// Reject values that would leave the hub unable to buffer anything
    pub fn validate(&self) -> Result<(), ConfigError> {
        let queues = [
            ("server.max_publish_recipients", self.server.max_publish_recipients),
            ("hub.outbox_capacity", self.hub.outbox_capacity),
            ("hub.register_queue", self.hub.register_queue),
            ("hub.unregister_queue", self.hub.unregister_queue),
            ("hub.fanout_queue", self.hub.fanout_queue),
            ("hub.presence_channel", self.hub.presence_channel),
            ("websocket.max_message_size", self.websocket.max_message_size),
        ];

        for (name, value) in queues {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be greater than 0", name)));
            }
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(ConfigError::Invalid(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                other
            ))),
        }
    }

    /// Address the HTTP server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, which maps a `CHATHUB_*` key to its value.
    /// Values that fail to parse are ignored with a warning.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parsed<T: std::str::FromStr>(key: &str, value: Option<String>) -> Option<T> {
            let raw = value?;
            match raw.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid value {:?} for {}", raw, key);
                    None
                }
            }
        }

        // Server
        if let Some(host) = lookup("CHATHUB_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parsed("CHATHUB_PORT", lookup("CHATHUB_PORT")) {
            self.server.port = port;
        }
        if let Some(v) = parsed(
            "CHATHUB_MAX_PUBLISH_RECIPIENTS",
            lookup("CHATHUB_MAX_PUBLISH_RECIPIENTS"),
        ) {
            self.server.max_publish_recipients = v;
        }

        // Hub
        if let Some(v) = parsed("CHATHUB_OUTBOX_CAPACITY", lookup("CHATHUB_OUTBOX_CAPACITY")) {
            self.hub.outbox_capacity = v;
        }
        if let Some(v) = parsed("CHATHUB_FANOUT_QUEUE", lookup("CHATHUB_FANOUT_QUEUE")) {
            self.hub.fanout_queue = v;
        }
        if let Some(v) = parsed("CHATHUB_OVERFLOW_POLICY", lookup("CHATHUB_OVERFLOW_POLICY")) {
            self.hub.overflow_policy = v;
        }
        if let Some(v) = parsed("CHATHUB_DUPLICATE_POLICY", lookup("CHATHUB_DUPLICATE_POLICY")) {
            self.hub.duplicate_policy = v;
        }

        // WebSocket
        if let Some(v) = parsed("CHATHUB_MAX_MESSAGE_SIZE", lookup("CHATHUB_MAX_MESSAGE_SIZE")) {
            self.websocket.max_message_size = v;
        }

        // Logging
        if let Some(level) = lookup("CHATHUB_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("CHATHUB_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Chathub Configuration
#
# Environment variables override these settings:
# - CHATHUB_HOST
# - CHATHUB_PORT
# - CHATHUB_MAX_PUBLISH_RECIPIENTS
# - CHATHUB_OUTBOX_CAPACITY
# - CHATHUB_FANOUT_QUEUE
# - CHATHUB_OVERFLOW_POLICY
# - CHATHUB_DUPLICATE_POLICY
# - CHATHUB_MAX_MESSAGE_SIZE
# - CHATHUB_LOG_LEVEL
# - CHATHUB_LOG_FORMAT

[server]
host = "0.0.0.0"
port = 8080

# Largest recipient list accepted by POST /api/v1/events
max_publish_recipients = 10000

[hub]
# Payloads buffered per connection before the overflow policy applies
outbox_capacity = 256

# Dispatcher queue capacities
register_queue = 256
unregister_queue = 256
fanout_queue = 1024

# When an outbox is full: "evict" drops the connection,
# "drop_newest" keeps it and discards the payload
overflow_policy = "evict"

# When a user connects twice: "replace" closes the old connection,
# "reject" closes the new one
duplicate_policy = "replace"

# Presence events retained for slow subscribers
presence_channel = 256

[websocket]
# Largest inbound frame accepted from a client (bytes)
max_message_size = 524288

# Outgoing write buffer (bytes)
write_buffer_size = 1024

# Maximum recipients for a client-relayed event
max_relay_recipients = 256

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

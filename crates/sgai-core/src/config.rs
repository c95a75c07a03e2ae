use crate::backoff::BackoffConfig;
use crate::error::{CoreError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Per-request timeout for the stream. `None` keeps the stream open
    /// indefinitely; liveness then relies on server keep-alives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    "http://localhost:3141".to_string()
}

fn default_stream_path() -> String {
    paths::EVENTS_STREAM_PATH.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_path: default_stream_path(),
            backoff: BackoffConfig::default(),
            request_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    pub fn stream_url(&self) -> String {
        paths::join_url(&self.base_url, &self.stream_path)
    }

    pub fn publish_url(&self) -> String {
        paths::join_url(&self.base_url, paths::EVENTS_PUBLISH_PATH)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Checks for the `client` section. Errors here are refused by
    /// [`ClientConfig::check`].
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        let url = &self.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            push(
                WarnLevel::Error,
                format!("client.base_url '{url}' must start with http:// or https://"),
            );
        }

        if !self.stream_path.starts_with('/') {
            push(
                WarnLevel::Error,
                format!(
                    "client.stream_path '{}' must start with '/'",
                    self.stream_path
                ),
            );
        }

        let backoff = &self.backoff;
        if backoff.base_ms == 0 {
            push(
                WarnLevel::Error,
                "client.backoff.base_ms must be greater than zero".to_string(),
            );
        }
        if backoff.base_ms > backoff.max_ms {
            push(
                WarnLevel::Error,
                format!(
                    "client.backoff.base_ms ({}) exceeds max_ms ({})",
                    backoff.base_ms, backoff.max_ms
                ),
            );
        }
        if !(0.0..=1.0).contains(&backoff.jitter) {
            push(
                WarnLevel::Error,
                format!("client.backoff.jitter ({}) must be within 0..=1", backoff.jitter),
            );
        }
        if backoff.factor < 1.0 {
            push(
                WarnLevel::Warning,
                format!(
                    "client.backoff.factor ({}) is below 1; retries will not back off",
                    backoff.factor
                ),
            );
        }

        warnings
    }

    /// Fail with [`CoreError::InvalidConfig`] listing every error-level
    /// problem; warnings pass.
    pub fn check(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidConfig(errors.join("; ")))
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Broadcast buffer per hub; slow subscribers beyond this lag and skip.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

fn default_port() -> u16 {
    3141
}

fn default_channel_capacity() -> usize {
    256
}

fn default_keep_alive_secs() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            channel_capacity: default_channel_capacity(),
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl ServerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load `<root>/.sgai/config.yaml`, or the defaults when it is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Write the default config unless one exists. Returns true if written.
    pub fn init(root: &Path) -> Result<bool> {
        let data = serde_yaml::to_string(&Self::default())?;
        crate::io::write_if_missing(&paths::config_path(root), data.as_bytes())
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.client.base_url = url.into();
        self
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = self.client.validate();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if self.server.channel_capacity == 0 {
            push(
                WarnLevel::Error,
                "server.channel_capacity must be greater than zero".to_string(),
            );
        }

        warnings
    }
}

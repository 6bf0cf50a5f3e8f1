//! TOML-based settings persistence for the bridge.
//!
//! Reads [`BridgeSettings`] at `<config dir>/dexcom-osc-bridge/config.toml`:
//! - Linux:    `~/.config/dexcom-osc-bridge/config.toml`
//! - macOS:    `~/Library/Application Support/dexcom-osc-bridge/config.toml`
//! - Windows:  `%APPDATA%\dexcom-osc-bridge\config.toml`
//!
//! The file is optional.  Every field has a serde default, so a partial file
//! only overrides what it names and a missing file yields
//! [`BridgeSettings::default()`]:
//!
//! ```toml
//! [polling]
//! interval_secs = 60
//! min_delta = 3
//!
//! [discovery]
//! instance_prefix = "VRChat-Client-"
//!
//! [chatbox]
//! prefix = "Glucose"
//! ```
//!
//! Command-line flags override values read from here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gluco_core::ChatboxFormat;
use serde::Deserialize;
use thiserror::Error;

use crate::application::backoff::BackoffPolicy;
use crate::application::poll_engine::PollSettings;

/// Directory name under the platform config base.
pub const APP_DIR_NAME: &str = "dexcom-osc-bridge";

/// Error type for settings file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

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
}

// ── Settings schema types ─────────────────────────────────────────────────────

/// Top-level settings stored on disk.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BridgeSettings {
    #[serde(default)]
    pub polling: PollingSection,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub share: ShareSection,
    #[serde(default)]
    pub chatbox: ChatboxSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Poll cadence and retry tuning.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PollingSection {
    /// Seconds between cycles.  Values below 10 are raised to 10.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// First retry delay after a transient failure.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    /// Upper bound on the retry delay.
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
    /// Minimum mg/dL change worth sending; `0` disables the filter.
    #[serde(default)]
    pub min_delta: u16,
}

/// mDNS discovery tuning.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DiscoverySection {
    #[serde(default = "default_service_type")]
    pub service_type: String,
    /// Only instances whose full name starts with this are accepted.
    #[serde(default = "default_instance_prefix")]
    pub instance_prefix: String,
    /// How long one browse waits for a responder.
    #[serde(default = "default_browse_timeout_ms")]
    pub browse_timeout_ms: u64,
    /// How long a discovered address is reused before browsing again.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

/// HTTP timeouts for the Share client.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ShareSection {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Chatbox text settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChatboxSection {
    /// Label shown before the value.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Whether the chatbox plays its notification sound.
    #[serde(default = "default_true")]
    pub notify: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_interval_secs() -> u64 {
    30
}
fn default_backoff_base_secs() -> u64 {
    5
}
fn default_backoff_cap_secs() -> u64 {
    300
}
fn default_service_type() -> String {
    "_osc._udp.local.".to_string()
}
fn default_instance_prefix() -> String {
    "VRChat-Client-".to_string()
}
fn default_browse_timeout_ms() -> u64 {
    3_000
}
fn default_ttl_secs() -> u64 {
    60
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_request_timeout_secs() -> u64 {
    20
}
fn default_prefix() -> String {
    "BG".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
            min_delta: 0,
        }
    }
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            service_type: default_service_type(),
            instance_prefix: default_instance_prefix(),
            browse_timeout_ms: default_browse_timeout_ms(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl Default for ShareSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for ChatboxSection {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            notify: default_true(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl BridgeSettings {
    /// Engine tunables derived from the `[polling]` and `[chatbox]` sections.
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.polling.interval_secs),
            backoff: BackoffPolicy::new(
                Duration::from_secs(self.polling.backoff_base_secs),
                Duration::from_secs(self.polling.backoff_cap_secs),
            ),
            min_delta: self.polling.min_delta,
            format: ChatboxFormat {
                prefix: self.chatbox.prefix.clone(),
            },
        }
    }
}

// ── Settings repository ───────────────────────────────────────────────────────

/// Per-user directory holding both the settings file and the credential file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|base| base.join(APP_DIR_NAME))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the default settings file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn settings_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads settings from `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_settings(path: &Path) -> Result<BridgeSettings, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BridgeSettings::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

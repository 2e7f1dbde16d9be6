//! # Watch Configuration
//!
//! Configuration management for the watcher.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Command Line Flags (highest priority, applied by the binary)       │
//! │     --dir ./contacts --pretty                                          │
//! │                                                                         │
//! │  2. Environment Variables                                              │
//! │     CONTACT_WATCH_DIR=/srv/contacts                                    │
//! │     CONTACT_WATCH_POLL_MS=500                                          │
//! │                                                                         │
//! │  3. TOML Config File                                                   │
//! │     ~/.config/contact-watch/contact-watch.toml (Linux)                 │
//! │     ~/Library/Application Support/org.contact-watch.contact-watch/     │
//! │       contact-watch.toml (macOS)                                       │
//! │                                                                         │
//! │  4. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # contact-watch.toml
//! [store]
//! path = "/srv/contacts"
//! create_if_missing = true
//!
//! [sync]
//! poll_interval_ms = 1000
//! poll_fallback = false
//! shutdown_grace_ms = 2000
//!
//! [output]
//! pretty = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

/// Default config file name inside the project config directory.
pub const CONFIG_FILE_NAME: &str = "contact-watch.toml";

/// Environment variable names.
pub mod env {
    pub const DIR: &str = "CONTACT_WATCH_DIR";
    pub const POLL_MS: &str = "CONTACT_WATCH_POLL_MS";
    pub const POLL_FALLBACK: &str = "CONTACT_WATCH_POLL_FALLBACK";
    pub const PRETTY: &str = "CONTACT_WATCH_PRETTY";
    pub const GRACE_MS: &str = "CONTACT_WATCH_GRACE_MS";
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "contact-watch", "contact-watch")
}

// =============================================================================
// Store Settings
// =============================================================================

/// Where the records live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Directory of native contact documents.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Create the directory when access is requested and it is missing.
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
}

fn default_store_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("contacts"))
        .unwrap_or_else(|| PathBuf::from("contacts"))
}

fn default_true() -> bool {
    true
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            path: default_store_path(),
            create_if_missing: true,
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Coordinator loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Upper bound on how long the loop waits between wake-ups (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Treat every poll tick as a wake-up.
    #[serde(default)]
    pub poll_fallback: bool,

    /// How long an in-flight cycle may run after a shutdown request
    /// (milliseconds).
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_shutdown_grace() -> u64 {
    2000
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            poll_interval_ms: default_poll_interval(),
            poll_fallback: false,
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

// =============================================================================
// Output Settings
// =============================================================================

/// Frame rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Pretty-print each JSON document.
    #[serde(default)]
    pub pretty: bool,
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete watcher configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub output: OutputSettings,
}

impl WatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`contact-watch.toml`)
    /// 3. Environment variables
    ///
    /// An explicitly given path must exist; the default path is optional.
    /// The result is not validated: callers apply their own overrides and
    /// then call [`WatchConfig::validate`].
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        let explicit = config_path.is_some();
        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(path = %path.display(), "Loading config from file");
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    SyncError::ConfigLoadFailed(format!("{}: {}", path.display(), e))
                })?;
                config = toml::from_str(&contents)?;
            } else if explicit {
                return Err(SyncError::ConfigLoadFailed(format!(
                    "{}: file not found",
                    path.display()
                )));
            } else {
                debug!(path = %path.display(), "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Saves configuration to file as pretty TOML.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(format!("{}: {}", parent.display(), e)))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .map_err(|e| SyncError::ConfigSaveFailed(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.store.path.as_os_str().is_empty() {
            return Err(SyncError::InvalidConfig("store.path must not be empty".into()));
        }

        if self.sync.poll_interval_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.poll_interval_ms must be greater than 0".into(),
            ));
        }

        if self.sync.shutdown_grace_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "sync.shutdown_grace_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup. Unparseable values
    /// are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(env::DIR) {
            debug!(path = %dir, "Overriding store path from environment");
            self.store.path = PathBuf::from(dir);
        }

        if let Some(value) = lookup(env::POLL_MS) {
            match value.parse::<u64>() {
                Ok(ms) => self.sync.poll_interval_ms = ms,
                Err(_) => warn!(key = env::POLL_MS, value = %value, "Ignoring invalid value"),
            }
        }

        if let Some(value) = lookup(env::POLL_FALLBACK) {
            match parse_bool(&value) {
                Some(enabled) => self.sync.poll_fallback = enabled,
                None => warn!(key = env::POLL_FALLBACK, value = %value, "Ignoring invalid value"),
            }
        }

        if let Some(value) = lookup(env::PRETTY) {
            match parse_bool(&value) {
                Some(pretty) => self.output.pretty = pretty,
                None => warn!(key = env::PRETTY, value = %value, "Ignoring invalid value"),
            }
        }

        if let Some(value) = lookup(env::GRACE_MS) {
            match value.parse::<u64>() {
                Ok(ms) => self.sync.shutdown_grace_ms = ms,
                Err(_) => warn!(key = env::GRACE_MS, value = %value, "Ignoring invalid value"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

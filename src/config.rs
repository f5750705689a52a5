//! Configuration loading and persistence.
//!
//! Reads `config.json` from the config directory, then applies
//! `SIGNER_RELAY_*` environment overrides. The API key is never written to
//! disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use std::{fs, path::Path, path::PathBuf};

use crate::constants::{DEFAULT_RELAY_URL, PENDING_REQUEST_CAPACITY, REQUEST_TIMEOUT};

/// Configuration for the relay client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// WebSocket URL of the relay.
    pub relay_url: String,
    /// API key sent as a bearer token - NOT serialized to disk.
    #[serde(skip)]
    pub api_key: String,
    /// Seconds a request waits for its response.
    pub request_timeout_secs: u64,
    /// Maximum outstanding requests before the oldest is evicted.
    pub registry_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            api_key: String::new(),
            request_timeout_secs: REQUEST_TIMEOUT.as_secs(),
            registry_capacity: PENDING_REQUEST_CAPACITY,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `SIGNER_RELAY_CONFIG_DIR` overrides the platform config dir.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("SIGNER_RELAY_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("signer-relay")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config dir {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing file falls back to defaults; so does a corrupt one, with a
    /// warning.
    pub fn load() -> Result<Self> {
        let path = Self::config_dir()?.join("config.json");
        let mut config = Self::load_or_default(&path);
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) if path.exists() => {
                log::warn!("Ignoring unusable config, using defaults: {e:#}");
                Self::default()
            }
            Err(_) => {
                log::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Loads configuration from `path` without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("SIGNER_RELAY_URL") {
            self.relay_url = url;
        }

        if let Some(key) = var("SIGNER_RELAY_API_KEY") {
            self.api_key = key;
        }

        if let Some(secs) = positive_override(&var, "SIGNER_RELAY_REQUEST_TIMEOUT") {
            self.request_timeout_secs = secs;
        }

        if let Some(capacity) = positive_override(&var, "SIGNER_RELAY_REGISTRY_CAPACITY") {
            self.registry_capacity = capacity;
        }
    }

    /// Persists the current configuration to the config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_dir()?.join("config.json"))
    }

    /// Persists the current configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Per-request response timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Headers to send on the WebSocket handshake.
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        if self.api_key.is_empty() {
            Vec::new()
        } else {
            vec![(
                "Authorization".to_string(),
                format!("Bearer {}", self.api_key),
            )]
        }
    }
}

/// Parse a numeric override; zero and garbage are ignored with a warning.
fn positive_override<N>(var: impl Fn(&str) -> Option<String>, name: &str) -> Option<N>
where
    N: std::str::FromStr + PartialEq + Default,
{
    let raw = var(name)?;
    match raw.trim().parse::<N>() {
        Ok(value) if value != N::default() => Some(value),
        Ok(_) => {
            log::warn!("Ignoring {name}=0, must be positive");
            None
        }
        Err(_) => {
            log::warn!("Ignoring {name}={raw:?}, not a number");
            None
        }
    }
}

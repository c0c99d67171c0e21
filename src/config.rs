//! Configuration Management
//!
//! Endpoints and polling settings. Later sources override earlier ones:
//! built-in defaults, the config file, environment variables, then CLI flags.

use crate::resource::WaitConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.aptible.com";
pub const DEFAULT_AUTH_URL: &str = "https://auth.aptible.com";

pub const API_URL_ENV: &str = "APTIBLE_API_URL";
pub const AUTH_URL_ENV: &str = "APTIBLE_AUTH_URL";
pub const POLL_INTERVAL_ENV: &str = "APTIBLE_POLL_INTERVAL_SECS";
pub const MAX_ATTEMPTS_ENV: &str = "APTIBLE_MAX_ATTEMPTS";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub auth_url: Option<String>,
    /// Seconds between operation polls
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    /// Polls before an operation is reported as timed out
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("aptible-mcp").join("config.json"))
    }

    /// Load configuration from disk, then apply the environment
    pub fn load() -> Self {
        let config = match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        };
        config.with_env(|name| std::env::var(name).ok())
    }

    /// Read a config file; a missing or unreadable file yields the defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Cannot read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Override settings from environment variables read through `lookup`
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_url = Some(url);
        }
        if let Some(url) = lookup(AUTH_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.auth_url = Some(url);
        }
        if let Some(secs) = parse_env(&lookup, POLL_INTERVAL_ENV) {
            self.poll_interval_secs = Some(secs);
        }
        if let Some(attempts) = parse_env(&lookup, MAX_ATTEMPTS_ENV) {
            self.max_attempts = Some(attempts);
        }
        self
    }

    pub fn effective_api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn effective_auth_url(&self) -> String {
        self.auth_url
            .clone()
            .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string())
    }

    /// Polling settings for the operation waiter
    pub fn wait_config(&self) -> WaitConfig {
        let defaults = WaitConfig::default();
        WaitConfig {
            poll_interval: self
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
        }
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a number", name, raw);
            None
        }
    }
}

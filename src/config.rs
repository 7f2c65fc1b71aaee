//! Configuration Management
//!
//! Handles persistent configuration storage for tfarm, with environment
//! overrides using the same `ARM_*` variables as other Azure tooling.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_STORAGE_SUFFIX: &str = "core.windows.net";

/// Cloud endpoints (public cloud by default)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Environment {
    pub resource_manager_endpoint: String,
    pub authority_host: String,
    pub storage_suffix: String,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            resource_manager_endpoint: DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            storage_suffix: DEFAULT_STORAGE_SUFFIX.to_string(),
        }
    }
}

/// `api-version` used per resource provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiVersions {
    pub resources: String,
    pub storage: String,
    pub insights: String,
    pub network: String,
    pub key_vault: String,
}

impl Default for ApiVersions {
    fn default() -> Self {
        Self {
            resources: "2022-09-01".to_string(),
            storage: "2023-01-01".to_string(),
            insights: "2018-03-01".to_string(),
            network: "2023-09-01".to_string(),
            key_vault: "2023-07-01".to_string(),
        }
    }
}

/// Transport retry and long-running-operation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub operation_timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 800,
            max_delay_ms: 60_000,
            request_timeout_secs: 60,
            poll_interval_ms: 10_000,
            operation_timeout_ms: 30 * 60 * 1000,
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    /// Never persisted; only read from `ARM_CLIENT_SECRET`
    #[serde(skip)]
    pub client_secret: Option<String>,
    /// Never persisted; only read from `ARM_ACCESS_TOKEN`
    #[serde(skip)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub api_versions: ApiVersions,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tfarm").join("config.json"))
    }

    /// Load configuration from disk, then apply `ARM_*` environment overrides
    pub fn load() -> Self {
        let mut config = match Self::config_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {:#}", path, e);
                Self::default()
            }),
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load configuration from a specific file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("parsing config file {:?}", path))
    }

    /// Apply environment overrides; `lookup` abstracts `std::env::var` for tests
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("ARM_SUBSCRIPTION_ID") {
            self.subscription_id = Some(v);
        }
        if let Some(v) = non_empty("ARM_TENANT_ID") {
            self.tenant_id = Some(v);
        }
        if let Some(v) = non_empty("ARM_CLIENT_ID") {
            self.client_id = Some(v);
        }
        if let Some(v) = non_empty("ARM_CLIENT_SECRET") {
            self.client_secret = Some(v);
        }
        if let Some(v) = non_empty("ARM_ACCESS_TOKEN") {
            self.access_token = Some(v);
        }
        if let Some(v) = non_empty("ARM_ENDPOINT") {
            self.environment.resource_manager_endpoint = v.trim_end_matches('/').to_string();
        }
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective subscription (CLI > env > config)
    pub fn effective_subscription(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.subscription_id.clone())
            .filter(|s| !s.is_empty())
    }

    /// Set subscription and save it to the config file
    ///
    /// Only the file's own settings are written back; environment overrides
    /// applied to `self` stay out of it.
    pub fn set_subscription(&mut self, subscription_id: &str) -> Result<()> {
        self.subscription_id = Some(subscription_id.to_string());
        match Self::config_path() {
            Some(path) => Self::persist_subscription(&path, subscription_id),
            None => Ok(()),
        }
    }

    /// Rewrite the subscription in the config file at `path`
    pub fn persist_subscription(path: &Path, subscription_id: &str) -> Result<()> {
        let mut on_disk = Self::load_from(path)?;
        on_disk.subscription_id = Some(subscription_id.to_string());
        on_disk.save_to(path)
    }
}

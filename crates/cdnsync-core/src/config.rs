//! Configuration types for cdnsync
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Main cdnsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Remote API provider configuration
    pub provider: ProviderConfig,

    /// State store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Create a configuration for the given provider with defaults elsewhere
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            state_store: StateStoreConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.state_store.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Remote API provider configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Fastly API v1
    Fastly {
        /// Fastly API key
        api_key: String,
        /// API endpoint override (defaults to the public endpoint)
        #[serde(default)]
        base_url: Option<String>,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Fastly { api_key, base_url } => {
                if api_key.is_empty() {
                    return Err(crate::Error::config("Fastly API key cannot be empty"));
                }
                if let Some(url) = base_url
                    && !url.starts_with("https://")
                    && !url.starts_with("http://")
                {
                    return Err(crate::Error::config(format!(
                        "Fastly base URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Fastly { .. } => "fastly",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

// Hides the API key
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::Fastly { base_url, .. } => f
                .debug_struct("Fastly")
                .field("api_key", &"<REDACTED>")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Custom { factory, config } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .field("config", config)
                .finish(),
        }
    }
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,
}

impl StateStoreConfig {
    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.is_empty() => Err(crate::Error::config(
                "State file path cannot be empty",
            )),
            _ => Ok(()),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed wait after cloning a version, before readiness polling (ms)
    #[serde(default)]
    pub settle_delay_ms: u64,

    /// Maximum number of readiness polls after a clone
    ///
    /// Set to 0 to rely on `settle_delay_ms` alone.
    #[serde(default = "default_settle_poll_attempts")]
    pub settle_poll_attempts: u32,

    /// Wait between readiness polls (ms)
    #[serde(default = "default_settle_poll_interval_ms")]
    pub settle_poll_interval_ms: u64,

    /// Capacity of the reconcile event channel
    ///
    /// When full, events are dropped (with a warning log); reconciliation
    /// never blocks on a slow consumer.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        if self.settle_poll_attempts > 0 && self.settle_poll_interval_ms == 0 {
            return Err(crate::Error::config(
                "Settle poll interval must be > 0 when polling is enabled",
            ));
        }
        Ok(())
    }

    /// The post-clone settle policy described by this configuration
    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy {
            initial_delay: Duration::from_millis(self.settle_delay_ms),
            poll_attempts: self.settle_poll_attempts,
            poll_interval: Duration::from_millis(self.settle_poll_interval_ms),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 0,
            settle_poll_attempts: default_settle_poll_attempts(),
            settle_poll_interval_ms: default_settle_poll_interval_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// How long to wait for a cloned version to accept writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    /// Unconditional wait right after the clone
    pub initial_delay: Duration,
    /// Readiness polls before giving up (0 disables polling)
    pub poll_attempts: u32,
    /// Wait between polls
    pub poll_interval: Duration,
}

fn default_settle_poll_attempts() -> u32 {
    10
}

fn default_settle_poll_interval_ms() -> u64 {
    1000
}

fn default_event_channel_capacity() -> usize {
    1000
}

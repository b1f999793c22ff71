//! Configuration types for the zonesync system
//!
//! This module defines all configuration structures used throughout the crate.
//! The daemon fills a [`SyncConfig`] from `ZONESYNC_*` environment variables;
//! embedders may construct or deserialize one directly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main zonesync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Record store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Remote provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Resync channel and worker settings
    #[serde(default)]
    pub resync: ResyncConfig,

    /// Analytics retention settings
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl SyncConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.provider.validate()?;
        self.resync.validate()?;
        self.analytics.validate()?;
        Ok(())
    }
}

/// Record store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-based record store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory record store (not persistent)
    #[default]
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.trim().is_empty() => {
                Err(crate::Error::config("Record store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
        }
    }
}

/// Remote provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Override for the provider API base URL
    #[serde(default)]
    pub api_base: Option<String>,

    /// HTTP client timeout (in seconds)
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,

    /// Log mutating calls instead of sending them
    #[serde(default)]
    pub dry_run: bool,

    /// Reuse one remote handle per credential pair
    #[serde(default = "default_cache_clients")]
    pub cache_clients: bool,
}

impl ProviderConfig {
    /// Validate the provider settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("HTTP timeout must be > 0"));
        }
        if let Some(base) = &self.api_base {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(crate::Error::config(format!(
                    "API base must be an http(s) URL, got {}",
                    base
                )));
            }
        }
        Ok(())
    }

    /// HTTP client timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            timeout_secs: default_http_timeout_secs(),
            dry_run: false,
            cache_clients: default_cache_clients(),
        }
    }
}

/// Resync channel and worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResyncConfig {
    /// Number of worker tasks sharing the queue
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the resync queue
    ///
    /// A domain fan-out that finds the queue full resyncs the overflow
    /// records inline.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Total deliveries of a message before it is abandoned
    #[serde(default = "default_max_deliveries")]
    pub max_deliveries: u32,

    /// Base redelivery delay (in milliseconds), doubled per attempt
    #[serde(default = "default_redelivery_delay_ms")]
    pub redelivery_delay_ms: u64,

    /// Upper bound on the redelivery delay (in milliseconds)
    #[serde(default = "default_max_redelivery_delay_ms")]
    pub max_redelivery_delay_ms: u64,

    /// How long a per-record lease stays valid (in seconds)
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    /// Interval between full domain resyncs (in seconds), 0 disables
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,

    /// Capacity of the worker event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ResyncConfig {
    /// Validate the resync settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.workers == 0 {
            return Err(crate::Error::config("At least one resync worker is required"));
        }
        if self.queue_capacity == 0 {
            return Err(crate::Error::config("Resync queue capacity must be > 0"));
        }
        if self.max_deliveries == 0 {
            return Err(crate::Error::config("Max deliveries must be > 0"));
        }
        if self.lease_ttl_secs == 0 {
            return Err(crate::Error::config("Lease TTL must be > 0"));
        }
        if self.max_redelivery_delay_ms < self.redelivery_delay_ms {
            return Err(crate::Error::config(
                "Max redelivery delay cannot be below the base delay",
            ));
        }
        Ok(())
    }

    /// Delay before delivery number `attempt + 1`
    pub fn redelivery_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self
            .redelivery_delay_ms
            .saturating_mul(factor)
            .min(self.max_redelivery_delay_ms);
        Duration::from_millis(ms)
    }

    /// Base redelivery delay
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.redelivery_delay_ms)
    }

    /// Lease TTL
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    /// Periodic resync interval, `None` when disabled
    pub fn resync_interval(&self) -> Option<Duration> {
        (self.resync_interval_secs > 0).then(|| Duration::from_secs(self.resync_interval_secs))
    }
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            max_deliveries: default_max_deliveries(),
            redelivery_delay_ms: default_redelivery_delay_ms(),
            max_redelivery_delay_ms: default_max_redelivery_delay_ms(),
            lease_ttl_secs: default_lease_ttl_secs(),
            resync_interval_secs: default_resync_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Longest accepted snapshot retention, in days
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Analytics retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Days of snapshots to keep, 0 keeps everything
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Interval between purge runs (in seconds)
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

impl AnalyticsConfig {
    /// Validate the retention settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(crate::Error::config(format!(
                "Analytics retention cannot exceed {} days (got {})",
                MAX_RETENTION_DAYS, self.retention_days
            )));
        }
        Ok(())
    }

    /// Retention window, `None` when purging is disabled
    pub fn retention(&self) -> Option<chrono::Duration> {
        (self.retention_days > 0).then(|| chrono::Duration::days(i64::from(self.retention_days)))
    }

    /// Interval between purge runs
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs.max(1))
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_cache_clients() -> bool {
    true
}

fn default_workers() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_max_deliveries() -> u32 {
    5
}

fn default_redelivery_delay_ms() -> u64 {
    1_000
}

fn default_max_redelivery_delay_ms() -> u64 {
    60_000
}

fn default_lease_ttl_secs() -> u64 {
    60
}

fn default_resync_interval_secs() -> u64 {
    3600
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_retention_days() -> u32 {
    30
}

fn default_purge_interval_secs() -> u64 {
    3600
}

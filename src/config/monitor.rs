//! Monitor configuration file model.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, MatchPolicy, NormalSettings, PoolSettings, SchedulerSettings};

/// Settings shared by the tasks of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskClassConfig {
    /// Delay between cycles of one task, in milliseconds.
    pub poll_interval_ms: u64,
    /// Delay each task start by a random jitter below the poll interval.
    pub burst_start: bool,
    /// Number of tasks in the group.
    pub num_tasks: usize,
}

impl Default for TaskClassConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            burst_start: true,
            num_tasks: 1,
        }
    }
}

impl TaskClassConfig {
    /// Poll interval as a duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self, group: &str) -> Result<(), String> {
        if self.poll_interval_ms == 0 {
            return Err(format!("{group}.pollIntervalMs must be greater than 0"));
        }
        if self.num_tasks == 0 {
            return Err(format!("{group}.numTasks must be greater than 0"));
        }
        Ok(())
    }
}

/// SKU batching and threshold tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Maximum SKUs per request.
    pub batch_size: usize,
    /// Consecutive missing responses before a SKU is reset to unloaded.
    pub unload_threshold: u32,
    /// Consecutive empty size lists before the stored sizes are cleared.
    pub size_reset_threshold: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let settings = SchedulerSettings::default();
        Self {
            batch_size: settings.batch_size,
            unload_threshold: settings.unload_threshold,
            size_reset_threshold: settings.size_reset_threshold,
        }
    }
}

impl From<SchedulerConfig> for SchedulerSettings {
    fn from(cfg: SchedulerConfig) -> Self {
        Self {
            batch_size: cfg.batch_size,
            unload_threshold: cfg.unload_threshold,
            size_reset_threshold: cfg.size_reset_threshold,
        }
    }
}

/// Root monitor configuration. Every field has a default, so a partial file
/// is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    /// Tasks monitoring explicit and promoted SKUs.
    pub normal: TaskClassConfig,
    /// Tasks watching the new-arrivals listing.
    pub discovery: TaskClassConfig,
    /// Concurrent leases allowed per proxy.
    pub max_leases_per_proxy: u32,
    /// Proxy list name; empty means direct egress.
    pub proxyfile: String,
    /// Evict proxies that answer 403.
    pub auto_remove_bad_proxy: bool,
    /// Batching and thresholds.
    pub scheduler: SchedulerConfig,
    /// Alert on price increases as well as drops.
    pub notify_price_increase: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            normal: TaskClassConfig::default(),
            discovery: TaskClassConfig::default(),
            max_leases_per_proxy: PoolSettings::default().max_leases_per_proxy,
            proxyfile: String::new(),
            auto_remove_bad_proxy: false,
            scheduler: SchedulerConfig::default(),
            notify_price_increase: false,
        }
    }
}

impl MonitorConfig {
    /// Validate value ranges.
    ///
    /// # Errors
    ///
    /// A description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        self.normal.validate("normal")?;
        self.discovery.validate("discovery")?;
        if self.max_leases_per_proxy == 0 {
            return Err("maxLeasesPerProxy must be greater than 0".into());
        }
        if self.scheduler.batch_size == 0 {
            return Err("scheduler.batchSize must be greater than 0".into());
        }
        if self.scheduler.unload_threshold == 0 {
            return Err("scheduler.unloadThreshold must be greater than 0".into());
        }
        if self.scheduler.size_reset_threshold == 0 {
            return Err("scheduler.sizeResetThreshold must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read the file at `path`, writing the default configuration there first
    /// if it does not exist.
    ///
    /// # Errors
    ///
    /// I/O, parse or validation failure.
    pub fn load_or_create(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let cfg = Self::default();
            let json = serde_json::to_string_pretty(&cfg)?;
            fs::write(path, json)
                .with_context(|| format!("writing default config to {}", path.display()))?;
            tracing::info!(path = %path.display(), "default config created");
            return Ok(cfg);
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&raw)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("loading config {}", path.display()))
    }

    /// Settings for the normal group.
    #[must_use]
    pub fn normal_settings(&self) -> NormalSettings {
        NormalSettings {
            poll_interval: self.normal.poll_interval(),
            scheduler: self.scheduler.into(),
            policy: MatchPolicy {
                notify_price_increase: self.notify_price_increase,
            },
        }
    }

    /// Settings for the proxy pool.
    #[must_use]
    pub const fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_leases_per_proxy: self.max_leases_per_proxy,
            remove_bad_proxies: self.auto_remove_bad_proxy,
        }
    }
}

//! Configuration Module
//!
//! Handles loading and managing cache core configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{DataType, TtlPolicy};

/// Settings for every cache store instance.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Interval between background sweeps of expired entries
    pub sweep_interval: Duration,
    /// Upper bound on a single store call before it fails with `StoreUnavailable`
    pub call_timeout: Duration,
    /// Capacity of the owner task's command queue
    pub command_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
            call_timeout: Duration::from_secs(5),
            command_buffer: 1024,
        }
    }
}

/// Settings for the analytics collector.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// Interval between time-series snapshots
    pub snapshot_interval: Duration,
    /// Capacity of the record channel; events beyond it are dropped
    pub channel_capacity: usize,
    /// Maximum buffered operation events
    pub operation_buffer: usize,
    /// Maximum keys with retained statistics
    pub key_stats_capacity: usize,
    /// Maximum response-time samples
    pub response_samples: usize,
    /// Maximum retained time-series snapshots (288 x 5min = 24h)
    pub snapshot_capacity: usize,
    /// Keys not accessed within this window are reported as cold
    pub cold_key_after: Duration,
    /// Number of hotspots reported by pattern analysis
    pub hotspot_limit: usize,
    /// Timeout for report queries against the collector task
    pub query_timeout: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: Duration::from_secs(60),
            channel_capacity: 1024,
            operation_buffer: 100,
            key_stats_capacity: 100,
            response_samples: 100,
            snapshot_capacity: 288,
            cold_key_after: Duration::from_secs(3600),
            hotspot_limit: 10,
            query_timeout: Duration::from_secs(5),
        }
    }
}

/// Batch sizing for cache warming.
///
/// The sizes are upstream rate-limit heuristics, kept configurable.
#[derive(Debug, Clone)]
pub struct WarmingConfig {
    /// Batch size for character, corporation and alliance lookups
    pub character_batch_size: usize,
    /// Batch size for system, item type and everything else
    pub system_batch_size: usize,
}

impl WarmingConfig {
    /// Returns the batch size to use for an entity class.
    pub fn batch_size_for(&self, data_type: DataType) -> usize {
        let size = match data_type {
            DataType::Character | DataType::Corporation | DataType::Alliance => {
                self.character_batch_size
            }
            _ => self.system_batch_size,
        };
        size.max(1)
    }
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            character_batch_size: 10,
            system_batch_size: 20,
        }
    }
}

/// Cache core configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub analytics: AnalyticsConfig,
    pub warming: WarmingConfig,
    pub ttl: TtlPolicy,
    /// Interval at which the host binary logs a health summary
    pub report_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            analytics: AnalyticsConfig::default(),
            warming: WarmingConfig::default(),
            ttl: TtlPolicy::default(),
            report_interval: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_SWEEP_INTERVAL_MS` - Expired entry sweep interval (default: 30000)
    /// - `CACHE_CALL_TIMEOUT_MS` - Store call timeout (default: 5000)
    /// - `CACHE_COMMAND_BUFFER` - Store command queue capacity (default: 1024)
    /// - `ANALYTICS_INTERVAL_SECS` - Snapshot interval (default: 60)
    /// - `ANALYTICS_CHANNEL_CAPACITY` - Record channel capacity (default: 1024)
    /// - `WARM_CHARACTER_BATCH_SIZE` - Character-class batch size (default: 10)
    /// - `WARM_SYSTEM_BATCH_SIZE` - System/type-class batch size (default: 20)
    /// - `REPORT_INTERVAL_SECS` - Health summary log interval (default: 300)
    pub fn from_env() -> Self {
        let store_defaults = StoreConfig::default();
        let analytics_defaults = AnalyticsConfig::default();
        let warming_defaults = WarmingConfig::default();

        Self {
            store: StoreConfig {
                sweep_interval: Duration::from_millis(env_or("CACHE_SWEEP_INTERVAL_MS", 30_000)),
                call_timeout: Duration::from_millis(env_or("CACHE_CALL_TIMEOUT_MS", 5_000)),
                command_buffer: env_or("CACHE_COMMAND_BUFFER", store_defaults.command_buffer),
            },
            analytics: AnalyticsConfig {
                snapshot_interval: Duration::from_secs(env_or("ANALYTICS_INTERVAL_SECS", 60)),
                channel_capacity: env_or(
                    "ANALYTICS_CHANNEL_CAPACITY",
                    analytics_defaults.channel_capacity,
                ),
                ..analytics_defaults
            },
            warming: WarmingConfig {
                character_batch_size: env_or(
                    "WARM_CHARACTER_BATCH_SIZE",
                    warming_defaults.character_batch_size,
                ),
                system_batch_size: env_or(
                    "WARM_SYSTEM_BATCH_SIZE",
                    warming_defaults.system_batch_size,
                ),
            },
            ttl: TtlPolicy::default(),
            report_interval: Duration::from_secs(env_or("REPORT_INTERVAL_SECS", 300)),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

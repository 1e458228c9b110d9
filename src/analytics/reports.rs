//! Analytics Report Types
//!
//! Read-only views derived from the collector state. `Default` is the
//! zero-value report returned when the collector cannot be reached.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analytics::DataTypeStats;

/// Aggregate usage counters.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UsageReport {
    pub total_operations: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub error_count: u64,
    /// Events dropped because the record channel was full
    pub dropped_events: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub avg_response_time_ms: f64,
    pub peak_usage_timestamp_ms: Option<u64>,
    pub data_types: BTreeMap<String, DataTypeStats>,
}

/// Normalized 0..1 efficiency scores.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct EfficiencyMetrics {
    pub hit_rate_score: f64,
    /// Share of tracked keys that have been hit at least once
    pub memory_efficiency: f64,
    pub time_efficiency: f64,
    /// Tracked keys relative to key-stats capacity
    pub cache_utilization: f64,
    /// Unweighted mean of the four scores above
    pub optimization_score: f64,
}

/// Summary of one key's activity.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct KeyActivity {
    pub key: String,
    pub access_count: u64,
    pub hit_rate: f64,
    pub avg_duration_ms: f64,
    pub last_accessed_ms: u64,
}

/// Operations recorded in one UTC hour of the day.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct HourlyUsage {
    pub hour: u32,
    pub operations: u64,
}

/// Access pattern analysis.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PatternAnalysis {
    /// Most accessed keys, busiest first
    pub hotspots: Vec<KeyActivity>,
    /// Keys not accessed within the cold window, least accessed first
    pub cold_keys: Vec<KeyActivity>,
    pub hourly_distribution: Vec<HourlyUsage>,
    pub peak_hour: Option<u32>,
    pub tracked_keys: usize,
    pub recommendations: Vec<String>,
}

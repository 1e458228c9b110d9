//! Analytics State
//!
//! Bounded in-memory aggregation of operation events. Owned by the collector
//! task; every buffer has a fixed capacity from `AnalyticsConfig`.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{TimeZone, Timelike, Utc};

use crate::analytics::{
    ratio, DataTypeStats, EfficiencyMetrics, HourlyUsage, KeyActivity, KeyStats, OperationEvent,
    OperationResult, PatternAnalysis, TimeSeriesSnapshot, UsageReport,
};
use crate::config::AnalyticsConfig;

/// Response time (ms) at which time efficiency reaches zero.
const TIME_EFFICIENCY_CEILING_MS: f64 = 100.0;

const LOW_HIT_RATE: f64 = 0.5;
const HOTSPOT_SHARE: f64 = 0.2;
const SLOW_RESPONSE_MS: f64 = 50.0;
/// Minimum hit/miss samples before hit-rate advice is given
const MIN_READS_FOR_ADVICE: u64 = 10;

#[derive(Debug)]
pub struct AnalyticsState {
    config: AnalyticsConfig,
    operations: VecDeque<OperationEvent>,
    key_stats: HashMap<String, KeyStats>,
    data_types: BTreeMap<String, DataTypeStats>,
    response_times: VecDeque<f64>,
    hourly: [u64; 24],
    snapshots: VecDeque<TimeSeriesSnapshot>,
    total_operations: u64,
    hits: u64,
    misses: u64,
    errors: u64,
    operations_at_last_snapshot: u64,
    access_sequence: u64,
}

impl AnalyticsState {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            operations: VecDeque::with_capacity(config.operation_buffer),
            key_stats: HashMap::with_capacity(config.key_stats_capacity),
            data_types: BTreeMap::new(),
            response_times: VecDeque::with_capacity(config.response_samples),
            hourly: [0; 24],
            snapshots: VecDeque::with_capacity(config.snapshot_capacity),
            total_operations: 0,
            hits: 0,
            misses: 0,
            errors: 0,
            operations_at_last_snapshot: 0,
            access_sequence: 0,
            config,
        }
    }

    // == Record ==
    /// Folds one event into every aggregate.
    pub fn record(&mut self, event: OperationEvent) {
        self.total_operations += 1;
        match event.result {
            OperationResult::Hit => self.hits += 1,
            OperationResult::Miss => self.misses += 1,
            OperationResult::Error => self.errors += 1,
            OperationResult::Ok => {}
        }

        push_bounded(&mut self.response_times, event.duration_ms, self.config.response_samples);
        self.hourly[hour_of_day(event.timestamp_ms) as usize] += 1;
        self.data_types
            .entry(event.data_type())
            .or_default()
            .record(&event);
        self.touch_key(&event);

        let capacity = self.config.operation_buffer;
        push_bounded(&mut self.operations, event, capacity);
    }

    fn touch_key(&mut self, event: &OperationEvent) {
        let capacity = self.config.key_stats_capacity;
        if capacity == 0 {
            return;
        }
        self.access_sequence += 1;

        if !self.key_stats.contains_key(&event.key) && self.key_stats.len() >= capacity {
            let least_recent = self
                .key_stats
                .iter()
                .min_by_key(|(_, stats)| stats.last_sequence)
                .map(|(key, _)| key.clone());
            if let Some(key) = least_recent {
                self.key_stats.remove(&key);
            }
        }

        self.key_stats
            .entry(event.key.clone())
            .or_default()
            .record(event, self.access_sequence);
    }

    // == Snapshot ==
    /// Appends a time-series snapshot, dropping the oldest beyond capacity.
    pub fn take_snapshot(&mut self, now_ms: u64) -> TimeSeriesSnapshot {
        let snapshot = TimeSeriesSnapshot {
            timestamp_ms: now_ms,
            total_operations: self.total_operations,
            operations_in_interval: self.total_operations - self.operations_at_last_snapshot,
            hit_rate: self.hit_rate(),
            avg_response_time_ms: self.avg_response_time_ms(),
            tracked_keys: self.key_stats.len(),
        };
        self.operations_at_last_snapshot = self.total_operations;
        push_bounded(&mut self.snapshots, snapshot.clone(), self.config.snapshot_capacity);
        snapshot
    }

    // == Accessors ==
    pub fn buffered_operations(&self) -> usize {
        self.operations.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.key_stats.len()
    }

    pub fn key_stats(&self, key: &str) -> Option<&KeyStats> {
        self.key_stats.get(key)
    }

    pub fn recent_operations(&self) -> Vec<OperationEvent> {
        self.operations.iter().cloned().collect()
    }

    pub fn time_series(&self) -> Vec<TimeSeriesSnapshot> {
        self.snapshots.iter().cloned().collect()
    }

    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.hits + self.misses)
    }

    pub fn avg_response_time_ms(&self) -> f64 {
        if self.response_times.is_empty() {
            0.0
        } else {
            self.response_times.iter().sum::<f64>() / self.response_times.len() as f64
        }
    }

    // == Usage Report ==
    pub fn usage_report(&self, dropped_events: u64) -> UsageReport {
        let reads = self.hits + self.misses;
        let peak_usage_timestamp_ms = self
            .snapshots
            .iter()
            .filter(|snapshot| snapshot.operations_in_interval > 0)
            .max_by_key(|snapshot| snapshot.operations_in_interval)
            .map(|snapshot| snapshot.timestamp_ms)
            .or_else(|| self.operations.back().map(|event| event.timestamp_ms));

        UsageReport {
            total_operations: self.total_operations,
            hit_count: self.hits,
            miss_count: self.misses,
            error_count: self.errors,
            dropped_events,
            hit_rate: ratio(self.hits, reads),
            miss_rate: ratio(self.misses, reads),
            avg_response_time_ms: self.avg_response_time_ms(),
            peak_usage_timestamp_ms,
            data_types: self.data_types.clone(),
        }
    }

    // == Efficiency Metrics ==
    pub fn efficiency_metrics(&self) -> EfficiencyMetrics {
        let hit_rate_score = self.hit_rate();
        let memory_efficiency = if self.key_stats.is_empty() {
            1.0
        } else {
            let useful = self.key_stats.values().filter(|s| s.hit_count > 0).count();
            useful as f64 / self.key_stats.len() as f64
        };
        let time_efficiency =
            (1.0 - self.avg_response_time_ms() / TIME_EFFICIENCY_CEILING_MS).clamp(0.0, 1.0);
        let cache_utilization = if self.config.key_stats_capacity == 0 {
            0.0
        } else {
            (self.key_stats.len() as f64 / self.config.key_stats_capacity as f64).min(1.0)
        };

        EfficiencyMetrics {
            hit_rate_score,
            memory_efficiency,
            time_efficiency,
            cache_utilization,
            optimization_score: (hit_rate_score + memory_efficiency + time_efficiency + cache_utilization)
                / 4.0,
        }
    }

    // == Pattern Analysis ==
    pub fn analyze_patterns(&self, now_ms: u64) -> PatternAnalysis {
        let mut by_activity: Vec<(&String, &KeyStats)> = self.key_stats.iter().collect();
        by_activity.sort_by(|a, b| b.1.access_count.cmp(&a.1.access_count).then_with(|| a.0.cmp(b.0)));
        let hotspots: Vec<KeyActivity> = by_activity
            .iter()
            .take(self.config.hotspot_limit)
            .map(|(key, stats)| activity(key, stats))
            .collect();

        let cold_after = u64::try_from(self.config.cold_key_after.as_millis()).unwrap_or(u64::MAX);
        let mut cold: Vec<(&String, &KeyStats)> = self
            .key_stats
            .iter()
            .filter(|(_, stats)| now_ms.saturating_sub(stats.last_accessed_ms) >= cold_after)
            .collect();
        cold.sort_by(|a, b| {
            a.1.access_count
                .cmp(&b.1.access_count)
                .then_with(|| a.1.last_accessed_ms.cmp(&b.1.last_accessed_ms))
                .then_with(|| a.0.cmp(b.0))
        });
        let cold_keys: Vec<KeyActivity> = cold.iter().map(|(key, stats)| activity(key, stats)).collect();

        let hourly_distribution: Vec<HourlyUsage> = self
            .hourly
            .iter()
            .enumerate()
            .map(|(hour, operations)| HourlyUsage {
                hour: hour as u32,
                operations: *operations,
            })
            .collect();
        let peak_hour = hourly_distribution
            .iter()
            .filter(|usage| usage.operations > 0)
            .max_by_key(|usage| usage.operations)
            .map(|usage| usage.hour);

        let recommendations = self.pattern_recommendations(&hotspots, cold_keys.len());

        PatternAnalysis {
            hotspots,
            cold_keys,
            hourly_distribution,
            peak_hour,
            tracked_keys: self.key_stats.len(),
            recommendations,
        }
    }

    fn pattern_recommendations(&self, hotspots: &[KeyActivity], cold_count: usize) -> Vec<String> {
        let mut advice = Vec::new();

        let reads = self.hits + self.misses;
        if reads >= MIN_READS_FOR_ADVICE && self.hit_rate() < LOW_HIT_RATE {
            advice.push(format!(
                "Hit rate is {:.0}%; review TTLs and warm frequently missed keys",
                self.hit_rate() * 100.0
            ));
        }

        let tracked_accesses: u64 = self.key_stats.values().map(|s| s.access_count).sum();
        if let Some(top) = hotspots.first() {
            let share = ratio(top.access_count, tracked_accesses);
            if self.key_stats.len() > 1 && share > HOTSPOT_SHARE {
                advice.push(format!(
                    "Key '{}' receives {:.0}% of tracked accesses; keep it warm or give it a longer TTL",
                    top.key,
                    share * 100.0
                ));
            }
        }

        if !self.key_stats.is_empty() && cold_count * 2 > self.key_stats.len() {
            advice.push(format!(
                "{} of {} tracked keys are cold; shorter TTLs would release memory sooner",
                cold_count,
                self.key_stats.len()
            ));
        }

        if self.avg_response_time_ms() > SLOW_RESPONSE_MS {
            advice.push(format!(
                "Average response time is {:.1}ms; check for slow update functions or store contention",
                self.avg_response_time_ms()
            ));
        }

        advice
    }
}

fn activity(key: &str, stats: &KeyStats) -> KeyActivity {
    KeyActivity {
        key: key.to_string(),
        access_count: stats.access_count,
        hit_rate: stats.hit_rate(),
        avg_duration_ms: stats.avg_duration_ms(),
        last_accessed_ms: stats.last_accessed_ms,
    }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

fn hour_of_day(timestamp_ms: u64) -> u32 {
    Utc.timestamp_millis_opt(timestamp_ms as i64)
        .single()
        .map(|time| time.hour())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Metadata;

    const HOUR_MS: u64 = 3_600_000;

    fn event(key: &str, result: OperationResult, duration_ms: f64, timestamp_ms: u64) -> OperationEvent {
        OperationEvent {
            operation: "get".into(),
            key: key.into(),
            result,
            duration_ms,
            timestamp_ms,
            metadata: Metadata::new(),
        }
    }

    fn state() -> AnalyticsState {
        AnalyticsState::new(AnalyticsConfig::default())
    }

    #[test]
    fn test_bounded_memory_after_many_operations() {
        let mut state = state();
        for i in 0..10_000u64 {
            state.record(event(&format!("esi:character:{}", i), OperationResult::Hit, 1.0, i));
            assert!(state.buffered_operations() <= 100);
            assert!(state.tracked_keys() <= 100);
        }
        assert_eq!(state.buffered_operations(), 100);
        assert_eq!(state.tracked_keys(), 100);
        assert_eq!(state.usage_report(0).total_operations, 10_000);
    }

    #[test]
    fn test_least_recently_accessed_key_is_evicted() {
        let config = AnalyticsConfig {
            key_stats_capacity: 3,
            ..AnalyticsConfig::default()
        };
        let mut state = AnalyticsState::new(config);

        state.record(event("a", OperationResult::Hit, 1.0, 0));
        state.record(event("b", OperationResult::Hit, 1.0, 0));
        state.record(event("c", OperationResult::Hit, 1.0, 0));
        state.record(event("a", OperationResult::Hit, 1.0, 0));
        state.record(event("d", OperationResult::Hit, 1.0, 0));

        assert!(state.key_stats("b").is_none(), "b was least recently accessed");
        assert_eq!(state.key_stats("a").unwrap().access_count, 2);
        assert!(state.key_stats("c").is_some());
        assert!(state.key_stats("d").is_some());
    }

    #[test]
    fn test_usage_report_counts() {
        let mut state = state();
        state.record(event("esi:character:1", OperationResult::Hit, 2.0, 0));
        state.record(event("esi:character:1", OperationResult::Hit, 4.0, 0));
        state.record(event("esi:system:1", OperationResult::Miss, 6.0, 0));
        state.record(event("esi:system:1", OperationResult::Ok, 8.0, 0));
        state.record(event("dedup:killmail:1", OperationResult::Error, 0.0, 0));

        let report = state.usage_report(7);
        assert_eq!(report.total_operations, 5);
        assert_eq!(report.hit_count, 2);
        assert_eq!(report.miss_count, 1);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.dropped_events, 7);
        assert!((report.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((report.miss_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((report.avg_response_time_ms - 4.0).abs() < 1e-9);
        assert_eq!(report.data_types["character"].hits, 2);
        assert_eq!(report.data_types["system"].operations, 2);
        assert_eq!(report.data_types["unknown"].operations, 1);
    }

    #[test]
    fn test_arbitrary_data_type_tags_do_not_grow_usage_map() {
        let mut state = state();
        for i in 0..500 {
            let mut tagged = event("dedup:custom:1", OperationResult::Ok, 1.0, 0);
            tagged
                .metadata
                .insert(crate::analytics::DATA_TYPE_TAG.into(), format!("tag-{}", i));
            state.record(tagged);
        }

        let report = state.usage_report(0);
        assert_eq!(report.data_types.len(), 1);
        assert_eq!(report.data_types["unknown"].operations, 500);
    }

    #[test]
    fn test_empty_state_reports_zero_values() {
        let state = state();
        let report = state.usage_report(0);
        assert_eq!(report.total_operations, 0);
        assert_eq!(report.hit_rate, 0.0);
        assert_eq!(report.peak_usage_timestamp_ms, None);

        let efficiency = state.efficiency_metrics();
        assert_eq!(efficiency.hit_rate_score, 0.0);
        assert_eq!(efficiency.memory_efficiency, 1.0);
        assert_eq!(efficiency.time_efficiency, 1.0);
        assert_eq!(efficiency.cache_utilization, 0.0);
        assert_eq!(efficiency.optimization_score, 0.5);
    }

    #[test]
    fn test_efficiency_optimization_is_mean_of_scores() {
        let mut state = state();
        state.record(event("a", OperationResult::Hit, 50.0, 0));
        state.record(event("b", OperationResult::Miss, 50.0, 0));

        let metrics = state.efficiency_metrics();
        assert_eq!(metrics.hit_rate_score, 0.5);
        assert_eq!(metrics.memory_efficiency, 0.5);
        assert_eq!(metrics.time_efficiency, 0.5);
        assert_eq!(metrics.cache_utilization, 0.02);
        let expected = (0.5 + 0.5 + 0.5 + 0.02) / 4.0;
        assert!((metrics.optimization_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_snapshots_are_capped_and_track_intervals() {
        let config = AnalyticsConfig {
            snapshot_capacity: 3,
            ..AnalyticsConfig::default()
        };
        let mut state = AnalyticsState::new(config);

        for tick in 0..5u64 {
            for _ in 0..tick {
                state.record(event("k", OperationResult::Hit, 1.0, tick));
            }
            state.take_snapshot(tick * 60_000);
        }

        let series = state.time_series();
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].timestamp_ms, 120_000);
        assert_eq!(series[2].operations_in_interval, 4);
        assert_eq!(series[2].total_operations, 10);
        assert_eq!(state.usage_report(0).peak_usage_timestamp_ms, Some(240_000));
    }

    #[test]
    fn test_patterns_hotspots_and_cold_keys() {
        let mut state = state();
        for _ in 0..5 {
            state.record(event("hot", OperationResult::Hit, 1.0, 2 * HOUR_MS));
        }
        state.record(event("warm", OperationResult::Hit, 1.0, 2 * HOUR_MS));
        state.record(event("cold-a", OperationResult::Miss, 1.0, 0));
        state.record(event("cold-b", OperationResult::Miss, 1.0, 0));
        state.record(event("cold-b", OperationResult::Miss, 1.0, HOUR_MS / 2));

        let patterns = state.analyze_patterns(2 * HOUR_MS);

        assert_eq!(patterns.hotspots[0].key, "hot");
        assert_eq!(patterns.hotspots[0].access_count, 5);
        let cold: Vec<&str> = patterns.cold_keys.iter().map(|k| k.key.as_str()).collect();
        assert_eq!(cold, vec!["cold-a", "cold-b"]);
        assert_eq!(patterns.hourly_distribution.len(), 24);
        assert_eq!(patterns.hourly_distribution[2].operations, 6);
        assert_eq!(patterns.peak_hour, Some(2));
        assert!(patterns
            .recommendations
            .iter()
            .any(|r| r.contains("'hot'")));
    }

    #[test]
    fn test_low_hit_rate_recommendation() {
        let mut state = state();
        for i in 0..20 {
            state.record(event(&format!("k{}", i), OperationResult::Miss, 1.0, 0));
        }

        let patterns = state.analyze_patterns(0);
        assert!(patterns.recommendations.iter().any(|r| r.starts_with("Hit rate is 0%")));
    }
}

//! Trend analysis over time-series snapshots

use std::time::Duration;

use serde::Serialize;

use crate::analytics::TimeSeriesSnapshot;

/// Hit-rate moves larger than this (absolute) count as a trend.
const HIT_RATE_THRESHOLD: f64 = 0.05;
/// Response-time and usage moves larger than this (relative) count as a trend.
const RELATIVE_THRESHOLD: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendAnalysis {
    InsufficientData {
        samples: usize,
    },
    Analyzed {
        samples: usize,
        window_ms: u64,
        hit_rate: Trend,
        performance: Trend,
        usage: Trend,
        /// Absolute change, last minus first
        hit_rate_change: f64,
        /// Relative change of average response time
        response_time_change: f64,
        /// Relative change of operations per interval
        usage_change: f64,
    },
}

impl TrendAnalysis {
    pub fn is_insufficient(&self) -> bool {
        matches!(self, TrendAnalysis::InsufficientData { .. })
    }
}

/// Compares the first and last snapshot taken within `window` before `now_ms`.
pub fn trends_from(snapshots: &[TimeSeriesSnapshot], now_ms: u64, window: Duration) -> TrendAnalysis {
    let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    let since = now_ms.saturating_sub(window_ms);
    let in_window: Vec<&TimeSeriesSnapshot> = snapshots
        .iter()
        .filter(|s| s.timestamp_ms >= since && s.timestamp_ms <= now_ms)
        .collect();

    let (first, last) = match (in_window.first(), in_window.last()) {
        (Some(first), Some(last)) if in_window.len() >= 2 => (*first, *last),
        _ => {
            return TrendAnalysis::InsufficientData {
                samples: in_window.len(),
            }
        }
    };

    let hit_rate_change = last.hit_rate - first.hit_rate;
    let response_time_change = relative_change(first.avg_response_time_ms, last.avg_response_time_ms);
    let usage_change = relative_change(
        first.operations_in_interval as f64,
        last.operations_in_interval as f64,
    );

    TrendAnalysis::Analyzed {
        samples: in_window.len(),
        window_ms,
        hit_rate: classify(hit_rate_change, HIT_RATE_THRESHOLD),
        // Falling latency is an improvement.
        performance: classify(-response_time_change, RELATIVE_THRESHOLD),
        usage: classify(usage_change, RELATIVE_THRESHOLD),
        hit_rate_change,
        response_time_change,
        usage_change,
    }
}

fn classify(change: f64, threshold: f64) -> Trend {
    if change > threshold {
        Trend::Improving
    } else if change < -threshold {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Relative change from `first` to `last`; growth from zero counts as +100%.
fn relative_change(first: f64, last: f64) -> f64 {
    if first > 0.0 {
        (last - first) / first
    } else if last > 0.0 {
        1.0
    } else {
        0.0
    }
}

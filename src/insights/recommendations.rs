//! Optimization recommendations
//!
//! Rule-based advice derived from usage, efficiency and access patterns.

use std::fmt;

use serde::Serialize;

use crate::analytics::{EfficiencyMetrics, PatternAnalysis, UsageReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    HitRate,
    Performance,
    Memory,
    AccessPattern,
    Capacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Higher is more urgent.
    pub fn severity(&self) -> u8 {
        match self {
            Priority::Critical => 4,
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub description: String,
    pub impact: String,
    pub implementation_hint: String,
    pub estimated_improvement: String,
}

impl Recommendation {
    fn new(
        kind: RecommendationKind,
        priority: Priority,
        description: String,
        impact: &str,
        implementation_hint: &str,
        estimated_improvement: &str,
    ) -> Self {
        Self {
            kind,
            priority,
            description,
            impact: impact.to_string(),
            implementation_hint: implementation_hint.to_string(),
            estimated_improvement: estimated_improvement.to_string(),
        }
    }
}

/// Builds the recommendation list, most urgent first.
pub fn recommendations_from(
    usage: &UsageReport,
    efficiency: &EfficiencyMetrics,
    patterns: &PatternAnalysis,
) -> Vec<Recommendation> {
    let mut out = Vec::new();
    let reads = usage.hit_count + usage.miss_count;

    if reads > 0 && usage.hit_rate < 0.5 {
        out.push(Recommendation::new(
            RecommendationKind::HitRate,
            Priority::Critical,
            format!("Hit rate is {:.1}%, most reads go to upstream APIs", usage.hit_rate * 100.0),
            "Upstream rate limits and notification latency",
            "Warm character and system data at startup and lengthen TTLs for static entities",
            "+30-50% hit rate",
        ));
    } else if reads > 0 && usage.hit_rate < 0.85 {
        out.push(Recommendation::new(
            RecommendationKind::HitRate,
            Priority::High,
            format!("Hit rate is {:.1}%, below the 85% target", usage.hit_rate * 100.0),
            "Avoidable upstream calls",
            "Review TTLs of the most missed data types",
            "+10-20% hit rate",
        ));
    }

    if usage.avg_response_time_ms > 50.0 {
        out.push(Recommendation::new(
            RecommendationKind::Performance,
            Priority::High,
            format!("Average response time is {:.1}ms", usage.avg_response_time_ms),
            "Every cache caller waits on the store owner",
            "Keep get_and_update functions cheap and split hot data into separate named stores",
            "-50% response time",
        ));
    } else if usage.avg_response_time_ms > 20.0 {
        out.push(Recommendation::new(
            RecommendationKind::Performance,
            Priority::Medium,
            format!("Average response time is {:.1}ms", usage.avg_response_time_ms),
            "Slower event processing under load",
            "Batch reads with mget where several keys are needed together",
            "-20% response time",
        ));
    }

    if patterns.tracked_keys > 0 && efficiency.memory_efficiency < 0.5 {
        out.push(Recommendation::new(
            RecommendationKind::Memory,
            Priority::Medium,
            format!(
                "Only {:.0}% of tracked keys have ever been hit",
                efficiency.memory_efficiency * 100.0
            ),
            "Memory spent on entries that are never read back",
            "Stop caching write-only data or shorten its TTL",
            "-30% memory",
        ));
    }

    if let Some(top) = patterns.hotspots.first() {
        let total: u64 = patterns.hotspots.iter().map(|k| k.access_count).sum();
        if patterns.hotspots.len() > 1 && total > 0 && top.access_count * 2 > total {
            out.push(Recommendation::new(
                RecommendationKind::AccessPattern,
                Priority::Low,
                format!("'{}' dominates access among hotspots", top.key),
                "A single expiring key causes bursts of upstream calls",
                "Pre-warm the key before expiry or give it a longer TTL",
                "Smoother upstream load",
            ));
        }
    }

    if patterns.tracked_keys > 0 && patterns.cold_keys.len() * 2 > patterns.tracked_keys {
        out.push(Recommendation::new(
            RecommendationKind::AccessPattern,
            Priority::Low,
            format!(
                "{} of {} tracked keys are cold",
                patterns.cold_keys.len(),
                patterns.tracked_keys
            ),
            "Memory held by entries nobody reads",
            "Shorten TTLs for rarely read data types",
            "-20% memory",
        ));
    }

    if efficiency.cache_utilization >= 0.9 {
        out.push(Recommendation::new(
            RecommendationKind::Capacity,
            Priority::Medium,
            format!(
                "Key statistics are {:.0}% full; older keys are being evicted from analytics",
                efficiency.cache_utilization * 100.0
            ),
            "Pattern analysis only sees the most recent keys",
            "Treat hotspot and cold-key lists as a sample, not a census",
            "More representative analytics",
        ));
    }

    if usage.dropped_events > 0 {
        out.push(Recommendation::new(
            RecommendationKind::Capacity,
            Priority::Medium,
            format!("{} analytics events were dropped", usage.dropped_events),
            "Reports undercount traffic",
            "Raise ANALYTICS_CHANNEL_CAPACITY",
            "Complete analytics",
        ));
    }

    out.sort_by(|a, b| b.priority.severity().cmp(&a.priority.severity()));
    out
}

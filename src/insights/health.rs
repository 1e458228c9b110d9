//! Health scoring
//!
//! Threshold ladders for each sub-score and the weighted composite.

use std::fmt;

use serde::Serialize;

use crate::analytics::{EfficiencyMetrics, UsageReport};

const HIT_RATE_WEIGHT: f64 = 0.30;
const PERFORMANCE_WEIGHT: f64 = 0.25;
const EFFICIENCY_WEIGHT: f64 = 0.25;
const RELIABILITY_WEIGHT: f64 = 0.20;

/// Reliability sub-score used while errors are not tracked per failure class.
pub const DEFAULT_RELIABILITY: f64 = 0.9;

// == Grade ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Grade::A
        } else if score >= 0.8 {
            Grade::B
        } else if score >= 0.7 {
            Grade::C
        } else if score >= 0.6 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// == Health Status ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            HealthStatus::Healthy
        } else if score >= 0.6 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        f.write_str(label)
    }
}

/// Sub-scores feeding the composite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthComponents {
    pub hit_rate: f64,
    pub performance: f64,
    pub efficiency: f64,
    pub reliability: f64,
}

/// Composite 0..1 health score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthScore {
    pub overall: f64,
    pub grade: Grade,
    pub status: HealthStatus,
    pub components: HealthComponents,
}

pub fn hit_rate_score(hit_rate: f64) -> f64 {
    if hit_rate >= 0.95 {
        1.0
    } else if hit_rate >= 0.85 {
        0.8
    } else if hit_rate >= 0.5 {
        0.6
    } else {
        0.3
    }
}

pub fn performance_score(avg_response_time_ms: f64) -> f64 {
    if avg_response_time_ms <= 5.0 {
        1.0
    } else if avg_response_time_ms <= 20.0 {
        0.8
    } else if avg_response_time_ms <= 50.0 {
        0.6
    } else {
        0.3
    }
}

/// Derives the health score from a usage report and efficiency metrics.
pub fn health_score_from(usage: &UsageReport, efficiency: &EfficiencyMetrics) -> HealthScore {
    let components = HealthComponents {
        hit_rate: hit_rate_score(usage.hit_rate),
        performance: performance_score(usage.avg_response_time_ms),
        efficiency: efficiency.optimization_score,
        reliability: DEFAULT_RELIABILITY,
    };
    let overall = HIT_RATE_WEIGHT * components.hit_rate
        + PERFORMANCE_WEIGHT * components.performance
        + EFFICIENCY_WEIGHT * components.efficiency
        + RELIABILITY_WEIGHT * components.reliability;

    HealthScore {
        overall,
        grade: Grade::from_score(overall),
        status: HealthStatus::from_score(overall),
        components,
    }
}

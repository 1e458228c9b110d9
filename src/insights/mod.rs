//! Insights module
//!
//! Health scoring, optimization advice, trend detection and report export
//! built on top of the analytics collector.

mod engine;
mod health;
mod recommendations;
mod report;
mod trends;

pub use engine::{InsightsEngine, DEFAULT_TREND_WINDOW};
pub use health::{
    health_score_from, hit_rate_score, performance_score, Grade, HealthComponents, HealthScore,
    HealthStatus, DEFAULT_RELIABILITY,
};
pub use recommendations::{recommendations_from, Priority, Recommendation, RecommendationKind};
pub use report::{DashboardData, ExportFormat, PerformanceReport, UnknownExportFormat};
pub use trends::{trends_from, Trend, TrendAnalysis};

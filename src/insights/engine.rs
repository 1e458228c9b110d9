//! Insights Engine
//!
//! Queries the analytics collector on demand and derives health, advice,
//! trends and reports. Nothing here is stored; every call recomputes.

use std::time::Duration;

use tracing::debug;

use crate::analytics::{
    AnalyticsCollector, EfficiencyMetrics, PatternAnalysis, TimeSeriesSnapshot, UsageReport,
};
use crate::cache::SharedClock;
use crate::insights::report::timestamp;
use crate::insights::{
    health_score_from, recommendations_from, trends_from, DashboardData, ExportFormat, HealthScore,
    PerformanceReport, Recommendation, TrendAnalysis,
};

/// Window used for the trends shown on the dashboard and in reports.
pub const DEFAULT_TREND_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

const DASHBOARD_HOTSPOTS: usize = 5;
const DASHBOARD_RECOMMENDATIONS: usize = 3;

#[derive(Debug, Clone)]
pub struct InsightsEngine {
    analytics: AnalyticsCollector,
    clock: SharedClock,
}

struct Inputs {
    usage: UsageReport,
    efficiency: EfficiencyMetrics,
    patterns: PatternAnalysis,
    series: Vec<TimeSeriesSnapshot>,
}

impl InsightsEngine {
    pub fn new(analytics: AnalyticsCollector, clock: SharedClock) -> Self {
        Self { analytics, clock }
    }

    pub async fn get_health_score(&self) -> HealthScore {
        let (usage, efficiency) = tokio::join!(
            self.analytics.get_usage_report(),
            self.analytics.get_efficiency_metrics()
        );
        health_score_from(&usage, &efficiency)
    }

    /// Recommendations sorted most urgent first.
    pub async fn get_optimization_recommendations(&self) -> Vec<Recommendation> {
        let (usage, efficiency, patterns) = tokio::join!(
            self.analytics.get_usage_report(),
            self.analytics.get_efficiency_metrics(),
            self.analytics.analyze_patterns()
        );
        recommendations_from(&usage, &efficiency, &patterns)
    }

    pub async fn analyze_trends(&self, window: Duration) -> TrendAnalysis {
        let series = self.analytics.time_series().await;
        trends_from(&series, self.clock.now_ms(), window)
    }

    pub async fn get_dashboard_data(&self) -> DashboardData {
        let inputs = self.gather().await;
        let now_ms = self.clock.now_ms();

        let mut top_recommendations =
            recommendations_from(&inputs.usage, &inputs.efficiency, &inputs.patterns);
        top_recommendations.truncate(DASHBOARD_RECOMMENDATIONS);
        let mut hotspots = inputs.patterns.hotspots;
        hotspots.truncate(DASHBOARD_HOTSPOTS);

        DashboardData {
            generated_at: timestamp(now_ms),
            health: health_score_from(&inputs.usage, &inputs.efficiency),
            trends: trends_from(&inputs.series, now_ms, DEFAULT_TREND_WINDOW),
            cold_key_count: inputs.patterns.cold_keys.len(),
            hotspots,
            top_recommendations,
            usage: inputs.usage,
            efficiency: inputs.efficiency,
        }
    }

    pub async fn generate_performance_report(&self) -> PerformanceReport {
        let inputs = self.gather().await;
        let now_ms = self.clock.now_ms();

        let health = health_score_from(&inputs.usage, &inputs.efficiency);
        let recommendations = recommendations_from(&inputs.usage, &inputs.efficiency, &inputs.patterns);
        let summary = format!(
            "Grade {} ({:.2}): {} operations at {:.1}% hit rate, {:.2}ms average response, {} recommendations",
            health.grade,
            health.overall,
            inputs.usage.total_operations,
            inputs.usage.hit_rate * 100.0,
            inputs.usage.avg_response_time_ms,
            recommendations.len()
        );
        debug!(grade = %health.grade, "Performance report generated");

        PerformanceReport {
            generated_at: timestamp(now_ms),
            summary,
            health,
            trends: trends_from(&inputs.series, now_ms, DEFAULT_TREND_WINDOW),
            recommendations,
            usage: inputs.usage,
            efficiency: inputs.efficiency,
            patterns: inputs.patterns,
        }
    }

    pub async fn export_report(&self, format: ExportFormat) -> String {
        self.generate_performance_report().await.render(format)
    }

    async fn gather(&self) -> Inputs {
        let (usage, efficiency, patterns, series) = tokio::join!(
            self.analytics.get_usage_report(),
            self.analytics.get_efficiency_metrics(),
            self.analytics.analyze_patterns(),
            self.analytics.time_series()
        );
        Inputs {
            usage,
            efficiency,
            patterns,
            series,
        }
    }
}

//! Dashboard and performance report types, plus export rendering.

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::analytics::{EfficiencyMetrics, KeyActivity, PatternAnalysis, UsageReport};
use crate::insights::{HealthScore, Recommendation, TrendAnalysis};

/// Compact view for a status page.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub generated_at: DateTime<Utc>,
    pub health: HealthScore,
    pub usage: UsageReport,
    pub efficiency: EfficiencyMetrics,
    pub hotspots: Vec<KeyActivity>,
    pub cold_key_count: usize,
    pub top_recommendations: Vec<Recommendation>,
    pub trends: TrendAnalysis,
}

/// Full report, the source for every export format.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub summary: String,
    pub health: HealthScore,
    pub usage: UsageReport,
    pub efficiency: EfficiencyMetrics,
    pub patterns: PatternAnalysis,
    pub recommendations: Vec<Recommendation>,
    pub trends: TrendAnalysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Text,
    Csv,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown export format '{0}', expected json, text or csv")]
pub struct UnknownExportFormat(pub String);

impl FromStr for ExportFormat {
    type Err = UnknownExportFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(UnknownExportFormat(s.to_string())),
        }
    }
}

pub(crate) fn timestamp(now_ms: u64) -> DateTime<Utc> {
    i64::try_from(now_ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_default()
}

impl PerformanceReport {
    pub fn render(&self, format: ExportFormat) -> String {
        match format {
            ExportFormat::Json => self.to_json(),
            ExportFormat::Text => self.to_text(),
            ExportFormat::Csv => self.to_csv(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }

    fn to_text(&self) -> String {
        // Writing into a String cannot fail.
        let mut out = String::new();
        let _ = writeln!(out, "Cache Performance Report ({})", self.generated_at.to_rfc3339());
        let _ = writeln!(out, "{}", self.summary);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Health: {:.2} (grade {}, {})",
            self.health.overall, self.health.grade, self.health.status
        );
        let c = &self.health.components;
        let _ = writeln!(
            out,
            "  hit rate {:.2}, performance {:.2}, efficiency {:.2}, reliability {:.2}",
            c.hit_rate, c.performance, c.efficiency, c.reliability
        );
        let _ = writeln!(
            out,
            "Usage: {} operations, {} hits, {} misses, {} errors, {} dropped",
            self.usage.total_operations,
            self.usage.hit_count,
            self.usage.miss_count,
            self.usage.error_count,
            self.usage.dropped_events
        );
        let _ = writeln!(
            out,
            "  hit rate {:.1}%, avg response {:.2}ms",
            self.usage.hit_rate * 100.0,
            self.usage.avg_response_time_ms
        );
        for (data_type, stats) in &self.usage.data_types {
            let _ = writeln!(
                out,
                "  {}: {} operations, {} hits, {} misses",
                data_type, stats.operations, stats.hits, stats.misses
            );
        }

        if !self.patterns.hotspots.is_empty() {
            let _ = writeln!(out, "Hotspots:");
            for (rank, key) in self.patterns.hotspots.iter().enumerate() {
                let _ = writeln!(out, "  {}. {} ({} accesses)", rank + 1, key.key, key.access_count);
            }
        }
        let _ = writeln!(out, "Cold keys: {}", self.patterns.cold_keys.len());

        if !self.recommendations.is_empty() {
            let _ = writeln!(out, "Recommendations:");
            for rec in &self.recommendations {
                let _ = writeln!(out, "  [{}] {}", rec.priority, rec.description);
                let _ = writeln!(out, "      {}", rec.implementation_hint);
            }
        }
        out
    }

    fn to_csv(&self) -> String {
        let mut rows: Vec<(String, String)> = vec![
            ("generated_at".into(), self.generated_at.to_rfc3339()),
            ("health_score".into(), format!("{:.4}", self.health.overall)),
            ("grade".into(), self.health.grade.to_string()),
            ("status".into(), self.health.status.to_string()),
            ("total_operations".into(), self.usage.total_operations.to_string()),
            ("hit_count".into(), self.usage.hit_count.to_string()),
            ("miss_count".into(), self.usage.miss_count.to_string()),
            ("error_count".into(), self.usage.error_count.to_string()),
            ("dropped_events".into(), self.usage.dropped_events.to_string()),
            ("hit_rate".into(), format!("{:.4}", self.usage.hit_rate)),
            (
                "avg_response_time_ms".into(),
                format!("{:.4}", self.usage.avg_response_time_ms),
            ),
            (
                "optimization_score".into(),
                format!("{:.4}", self.efficiency.optimization_score),
            ),
            ("tracked_keys".into(), self.patterns.tracked_keys.to_string()),
            ("cold_keys".into(), self.patterns.cold_keys.len().to_string()),
        ];
        for (i, rec) in self.recommendations.iter().enumerate() {
            rows.push((
                format!("recommendation_{}", i + 1),
                format!("{}: {}", rec.priority, rec.description),
            ));
        }

        let mut out = String::from("metric,value\n");
        for (metric, value) in rows {
            out.push_str(&metric);
            out.push(',');
            out.push_str(&csv_field(&value));
            out.push('\n');
        }
        out
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::health_score_from;

    fn report() -> PerformanceReport {
        let usage = UsageReport {
            total_operations: 10,
            hit_count: 9,
            miss_count: 1,
            hit_rate: 0.9,
            avg_response_time_ms: 2.0,
            ..UsageReport::default()
        };
        let efficiency = EfficiencyMetrics::default();
        PerformanceReport {
            generated_at: timestamp(0),
            summary: "summary".into(),
            health: health_score_from(&usage, &efficiency),
            usage,
            efficiency,
            patterns: PatternAnalysis::default(),
            recommendations: Vec::new(),
            trends: TrendAnalysis::InsufficientData { samples: 0 },
        }
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("json".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("TEXT".parse::<ExportFormat>(), Ok(ExportFormat::Text));
        assert_eq!(" csv ".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_json_export_parses() {
        let json = report().render(ExportFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["usage"]["total_operations"], 10);
        assert_eq!(value["trends"]["status"], "insufficient_data");
    }

    #[test]
    fn test_csv_export() {
        let csv = report().render(ExportFormat::Csv);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("metric,value"));
        assert!(csv.contains("total_operations,10\n"));
        assert!(csv.contains("hit_rate,0.9000\n"));
    }

    #[test]
    fn test_text_export() {
        let text = report().render(ExportFormat::Text);
        assert!(text.starts_with("Cache Performance Report"));
        assert!(text.contains("10 operations"));
        assert!(text.contains("Cold keys: 0"));
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}

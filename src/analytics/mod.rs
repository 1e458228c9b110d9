//! Analytics Module
//!
//! Records cache and dedup operations into bounded buffers and derives usage,
//! efficiency and access-pattern reports from them.

mod collector;
mod events;
mod reports;
mod state;

pub use collector::AnalyticsCollector;
pub use events::{
    classify_data_type, DataTypeStats, KeyStats, Metadata, OperationEvent, OperationResult,
    TimeSeriesSnapshot, DATA_TYPE_TAG,
};
pub(crate) use events::ratio;
pub use reports::{EfficiencyMetrics, HourlyUsage, KeyActivity, PatternAnalysis, UsageReport};
pub use state::AnalyticsState;

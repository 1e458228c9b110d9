//! Notifier Cache - in-process caching core for a killmail notification service
//!
//! Provides named TTL stores owned by single tasks, time-windowed event
//! deduplication, fire-and-forget usage analytics with derived health
//! insights, and batched cache warming.

pub mod analytics;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod error;
pub mod insights;
pub mod runtime;
pub mod tasks;
pub mod warming;

pub use analytics::AnalyticsCollector;
pub use cache::{CacheKey, CacheStore, DataType, ManualClock, StoreRegistry, SystemClock, TtlPolicy};
pub use config::Config;
pub use dedup::{DedupKind, DedupOutcome, DeduplicationService};
pub use error::{CacheError, Result};
pub use insights::{ExportFormat, InsightsEngine};
pub use runtime::CacheRuntime;
pub use warming::WarmingCoordinator;

//! Runtime wiring
//!
//! Starts the analytics collector and the named stores, and hands out the
//! services built on them. One runtime per process is the normal setup;
//! tests start as many as they like.

use std::sync::Arc;

use tracing::info;

use crate::analytics::AnalyticsCollector;
use crate::cache::{CacheStore, SharedClock, StoreRegistry, SystemClock};
use crate::config::Config;
use crate::dedup::DeduplicationService;
use crate::insights::InsightsEngine;
use crate::warming::WarmingCoordinator;

/// Name of the general-purpose store.
pub const MAIN_STORE: &str = "main";
/// Name of the store holding deduplication markers.
pub const DEDUP_STORE: &str = "dedup";

/// Shared handles to every running cache service.
#[derive(Debug, Clone)]
pub struct CacheRuntime {
    pub analytics: AnalyticsCollector,
    pub registry: Arc<StoreRegistry>,
    pub store: CacheStore,
    pub dedup: DeduplicationService,
    pub insights: InsightsEngine,
    pub warming: WarmingCoordinator,
}

impl CacheRuntime {
    /// Starts a runtime on the system clock.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(config: Config) -> Self {
        Self::start_with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn start_with_clock(config: Config, clock: SharedClock) -> Self {
        let analytics = AnalyticsCollector::start(config.analytics.clone(), clock.clone());
        let registry = Arc::new(
            StoreRegistry::new(config.store.clone(), clock.clone()).with_analytics(analytics.clone()),
        );

        let store = registry.get_or_start(MAIN_STORE).await;
        let dedup_store = registry.get_or_start(DEDUP_STORE).await;

        let runtime = Self {
            dedup: DeduplicationService::new(dedup_store, config.ttl.clone()),
            insights: InsightsEngine::new(analytics.clone(), clock),
            warming: WarmingCoordinator::new(store.clone(), config.warming.clone(), config.ttl.clone()),
            analytics,
            registry,
            store,
        };
        info!(stores = ?runtime.registry.names().await, "Cache runtime started");
        runtime
    }

    /// Returns the named store, starting it on first use.
    pub async fn store(&self, name: &str) -> CacheStore {
        self.registry.get_or_start(name).await
    }

    /// Stops every store and then the collector.
    pub async fn shutdown(&self) {
        self.registry.shutdown_all().await;
        self.analytics.shutdown().await;
        info!("Cache runtime stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::cache::ManualClock;
    use crate::dedup::DedupKind;

    #[tokio::test]
    async fn test_runtime_wires_services_together() {
        let clock = ManualClock::new(0);
        let runtime = CacheRuntime::start_with_clock(Config::default(), Arc::new(clock)).await;

        runtime.store.put("config:value:motd", json!("fly safe")).await.unwrap();
        assert!(runtime.dedup.check_and_mark(DedupKind::Killmail, 1).await.is_new());

        let usage = runtime.analytics.get_usage_report().await;
        assert!(usage.total_operations >= 2);
        assert_eq!(runtime.registry.names().await, vec![DEDUP_STORE, MAIN_STORE]);
    }

    #[tokio::test]
    async fn test_named_stores_are_isolated() {
        let runtime = CacheRuntime::start(Config::default()).await;
        let other = runtime.store("tracking").await;

        other.put("tracking:character:1", json!(true)).await.unwrap();
        assert!(!runtime.store.exists("tracking:character:1").await.unwrap());
        assert!(other.exists("tracking:character:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_stops_stores() {
        let runtime = CacheRuntime::start(Config::default()).await;
        runtime.shutdown().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(runtime.store.get("anything").await.is_err());
        assert!(!runtime.store.is_running());
    }
}

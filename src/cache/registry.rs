//! Store Registry Module
//!
//! Maps store names to running store handles. Each named instance owns its own
//! table and shares nothing with the others.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::info;

use crate::analytics::AnalyticsCollector;
use crate::cache::{CacheStore, SharedClock};
use crate::config::StoreConfig;

/// Registry of named cache stores.
#[derive(Debug)]
pub struct StoreRegistry {
    stores: RwLock<HashMap<String, CacheStore>>,
    config: StoreConfig,
    clock: SharedClock,
    analytics: Option<AnalyticsCollector>,
}

impl StoreRegistry {
    pub fn new(config: StoreConfig, clock: SharedClock) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            config,
            clock,
            analytics: None,
        }
    }

    /// Stores started from now on report to `collector`.
    pub fn with_analytics(mut self, collector: AnalyticsCollector) -> Self {
        self.analytics = Some(collector);
        self
    }

    /// Returns the running store registered under `name`, starting one if
    /// none is registered or the previous one has stopped.
    pub async fn get_or_start(&self, name: &str) -> CacheStore {
        if let Some(store) = self.lookup(name).await {
            return store;
        }

        let mut stores = self.stores.write().await;
        if let Some(store) = stores.get(name).filter(|store| store.is_running()) {
            return store.clone();
        }
        let mut store = CacheStore::start(name, &self.config, self.clock.clone());
        if let Some(collector) = &self.analytics {
            store = store.with_analytics(collector.clone());
        }
        stores.insert(name.to_string(), store.clone());
        store
    }

    /// Returns the store registered under `name` if it is still running.
    pub async fn lookup(&self, name: &str) -> Option<CacheStore> {
        self.stores
            .read()
            .await
            .get(name)
            .filter(|store| store.is_running())
            .cloned()
    }

    /// Stops and unregisters a store. Returns false if no such store exists.
    pub async fn stop(&self, name: &str) -> bool {
        let removed = self.stores.write().await.remove(name);
        match removed {
            Some(store) => {
                store.shutdown().await;
                true
            }
            None => false,
        }
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stops every registered store.
    pub async fn shutdown_all(&self) {
        let stores: Vec<CacheStore> = self.stores.write().await.drain().map(|(_, s)| s).collect();
        for store in &stores {
            store.shutdown().await;
        }
        info!("Stopped {} cache stores", stores.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::cache::ManualClock;
    use crate::error::CacheError;

    fn registry() -> StoreRegistry {
        StoreRegistry::new(StoreConfig::default(), Arc::new(ManualClock::new(0)))
    }

    #[tokio::test]
    async fn test_named_instances_are_isolated() {
        let registry = registry();
        let esi = registry.get_or_start("esi").await;
        let dedup = registry.get_or_start("dedup").await;

        esi.put("esi:character:1", json!(1)).await.unwrap();

        assert!(esi.exists("esi:character:1").await.unwrap());
        assert!(!dedup.exists("esi:character:1").await.unwrap());
        assert_eq!(registry.names().await, vec!["dedup".to_string(), "esi".to_string()]);
    }

    #[tokio::test]
    async fn test_get_or_start_returns_same_instance() {
        let registry = registry();
        let first = registry.get_or_start("main").await;
        first.put("k", json!("v")).await.unwrap();

        let second = registry.get_or_start("main").await;
        assert_eq!(second.get("k").await.unwrap(), json!("v"));
    }

    #[tokio::test]
    async fn test_stop_unregisters_and_stops_store() {
        let registry = registry();
        let store = registry.get_or_start("main").await;

        assert!(registry.stop("main").await);
        assert!(!registry.stop("main").await);
        assert!(registry.lookup("main").await.is_none());

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(matches!(store.get("k").await, Err(CacheError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_shutdown_all() {
        let registry = registry();
        registry.get_or_start("a").await;
        registry.get_or_start("b").await;

        registry.shutdown_all().await;
        assert!(registry.names().await.is_empty());
    }
}

//! Cache warming
//!
//! Pre-populates a store for a list of entity ids. Ids already cached are
//! skipped; the rest are fetched through a caller-supplied closure in batches
//! and bulk-written with the data type's TTL.

use std::fmt;
use std::future::Future;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStore, DataType, TtlPolicy};
use crate::config::WarmingConfig;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct WarmingCoordinator {
    store: CacheStore,
    config: WarmingConfig,
    ttl: TtlPolicy,
}

impl WarmingCoordinator {
    pub fn new(store: CacheStore, config: WarmingConfig, ttl: TtlPolicy) -> Self {
        Self { store, config, ttl }
    }

    /// Warms `ids` of `data_type` and returns how many are now cached.
    ///
    /// `fetch` receives the id as a string. Fetch failures and failed bulk
    /// writes are logged and not counted; store failures while checking
    /// which ids are already cached are returned. `progress` is called with
    /// `(completed, total)` once up front and after every batch.
    pub async fn warm<I, F, Fut, P>(
        &self,
        data_type: DataType,
        ids: &[I],
        mut fetch: F,
        mut progress: P,
    ) -> Result<usize>
    where
        I: fmt::Display,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = anyhow::Result<Value>>,
        P: FnMut(usize, usize),
    {
        let total = ids.len();
        let mut keyed = Vec::with_capacity(total);
        for id in ids {
            let id = id.to_string();
            let key = CacheKey::for_entity(data_type, &id)?.to_string();
            keyed.push((id, key));
        }

        let keys: Vec<String> = keyed.iter().map(|(_, key)| key.clone()).collect();
        let present = self.store.mget(&keys).await?;
        let missing: Vec<(String, String)> = keyed
            .into_iter()
            .zip(present)
            .filter(|(_, cached)| cached.is_err())
            .map(|(pair, _)| pair)
            .collect();

        let cached = total - missing.len();
        let mut warmed = cached;
        let mut completed = cached;
        progress(completed, total);

        if missing.is_empty() {
            debug!(%data_type, total, "Nothing to warm");
            return Ok(warmed);
        }

        let batch_size = self.config.batch_size_for(data_type);
        let ttl = self.ttl.ttl_for(data_type);

        for batch in missing.chunks(batch_size) {
            let mut fetched = Vec::with_capacity(batch.len());
            for (id, key) in batch {
                match fetch(id.clone()).await {
                    Ok(value) => fetched.push((key.clone(), value)),
                    Err(e) => warn!(%data_type, id = %id, error = %e, "Warm fetch failed"),
                }
            }

            if !fetched.is_empty() {
                match self.store.mset(fetched, ttl).await {
                    Ok(written) => warmed += written,
                    Err(e) => warn!(%data_type, error = %e, "Warm batch write failed"),
                }
            }

            completed += batch.len();
            progress(completed, total);
        }

        info!(%data_type, warmed, total, "Cache warming finished");
        Ok(warmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::anyhow;
    use serde_json::json;

    use crate::cache::{ManualClock, SharedClock};
    use crate::config::StoreConfig;

    fn coordinator(clock: &ManualClock, config: WarmingConfig) -> (CacheStore, WarmingCoordinator) {
        let shared: SharedClock = Arc::new(clock.clone());
        let store = CacheStore::start("warm", &StoreConfig::default(), shared);
        let warming = WarmingCoordinator::new(store.clone(), config, TtlPolicy::default());
        (store, warming)
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_counted() {
        let clock = ManualClock::new(0);
        let (store, warming) = coordinator(&clock, WarmingConfig::default());
        let mut calls = Vec::new();

        let warmed = warming
            .warm(
                DataType::Character,
                &[1, 2, 3],
                |id| async move {
                    if id == "3" {
                        Err(anyhow!("upstream 404"))
                    } else {
                        Ok(json!({ "id": id }))
                    }
                },
                |done, total| calls.push((done, total)),
            )
            .await
            .unwrap();

        assert_eq!(warmed, 2);
        assert_eq!(calls, vec![(0, 3), (3, 3)]);
        assert_eq!(store.get("esi:character:1").await.unwrap(), json!({ "id": "1" }));
        assert_eq!(store.get("esi:character:2").await.unwrap(), json!({ "id": "2" }));
        assert!(store.get("esi:character:3").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_cached_ids_are_skipped() {
        let clock = ManualClock::new(0);
        let (store, warming) = coordinator(&clock, WarmingConfig::default());
        store.put("esi:system:30000142", json!("Jita")).await.unwrap();
        let fetches = AtomicUsize::new(0);
        let mut calls = Vec::new();

        let warmed = warming
            .warm(
                DataType::System,
                &[30000142, 30002187],
                |_| {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    async { Ok(json!("fetched")) }
                },
                |done, total| calls.push((done, total)),
            )
            .await
            .unwrap();

        assert_eq!(warmed, 2);
        assert_eq!(calls, vec![(1, 2), (2, 2)]);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(store.get("esi:system:30000142").await.unwrap(), json!("Jita"));
    }

    #[tokio::test]
    async fn test_batches_report_progress() {
        let clock = ManualClock::new(0);
        let config = WarmingConfig {
            character_batch_size: 2,
            system_batch_size: 2,
        };
        let (_store, warming) = coordinator(&clock, config);
        let mut calls = Vec::new();

        let warmed = warming
            .warm(
                DataType::Corporation,
                &["10", "11", "12", "13", "14"],
                |id| async move { Ok(json!(id)) },
                |done, total| calls.push((done, total)),
            )
            .await
            .unwrap();

        assert_eq!(warmed, 5);
        assert_eq!(calls, vec![(0, 5), (2, 5), (4, 5), (5, 5)]);
    }

    #[tokio::test]
    async fn test_warmed_entries_use_data_type_ttl() {
        let clock = ManualClock::new(0);
        let (store, warming) = coordinator(&clock, WarmingConfig::default());

        warming
            .warm(DataType::Killmail, &[99], |_| async { Ok(json!({})) }, |_, _| {})
            .await
            .unwrap();
        assert!(store.exists("esi:killmail:99").await.unwrap());

        clock.advance(Duration::from_secs(30 * 60));
        assert!(!store.exists("esi:killmail:99").await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_store_propagates() {
        let clock = ManualClock::new(0);
        let (store, warming) = coordinator(&clock, WarmingConfig::default());
        store.shutdown().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = warming
            .warm(DataType::Alliance, &[1], |_| async { Ok(json!({})) }, |_, _| {})
            .await;
        assert!(result.is_err());
    }
}

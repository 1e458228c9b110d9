//! Cache Store Module
//!
//! Handle to a cache table owned by a dedicated task. Every operation, reads
//! included, is a command on the owner's queue, so read-modify-write cycles are
//! linearized per store. Calls that cannot reach the owner within the call
//! timeout fail with `StoreUnavailable`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsCollector, OperationResult};
use crate::cache::{CacheStats, CacheTable, Expiry, SharedClock};
use crate::config::StoreConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep_task, StopFlag};

type UpdateFn = Box<dyn FnOnce(Option<&Value>) -> Value + Send>;

// == Commands ==
enum Command {
    Get {
        key: String,
        reply: oneshot::Sender<Result<Value>>,
    },
    MultiGet {
        keys: Vec<String>,
        reply: oneshot::Sender<Vec<Result<Value>>>,
    },
    Set {
        key: String,
        value: Value,
        ttl: Option<Duration>,
        reply: oneshot::Sender<()>,
    },
    SetMany {
        items: Vec<(String, Value)>,
        ttl: Option<Duration>,
        reply: oneshot::Sender<usize>,
    },
    InsertIfAbsent {
        key: String,
        value: Value,
        ttl: Option<Duration>,
        reply: oneshot::Sender<bool>,
    },
    Update {
        key: String,
        update: UpdateFn,
        reply: oneshot::Sender<Result<(Option<Value>, Value)>>,
    },
    Exists {
        key: String,
        reply: oneshot::Sender<bool>,
    },
    Delete {
        key: String,
        reply: oneshot::Sender<Result<()>>,
    },
    DeletePrefix {
        prefix: String,
        reply: oneshot::Sender<usize>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    Sweep {
        reply: oneshot::Sender<usize>,
    },
    Stats {
        reply: oneshot::Sender<CacheStats>,
    },
    Shutdown,
}

// == Cache Store ==
/// Cloneable handle to a named cache store.
#[derive(Debug, Clone)]
pub struct CacheStore {
    name: Arc<str>,
    tx: mpsc::Sender<Command>,
    call_timeout: Duration,
    analytics: Option<AnalyticsCollector>,
    sweep_stop: StopFlag,
}

/// Handle that does not keep the owner task alive.
#[derive(Debug, Clone)]
pub struct WeakCacheStore {
    name: Arc<str>,
    tx: mpsc::WeakSender<Command>,
    call_timeout: Duration,
    sweep_stop: StopFlag,
}

impl WeakCacheStore {
    pub fn upgrade(&self) -> Option<CacheStore> {
        self.tx.upgrade().map(|tx| CacheStore {
            name: self.name.clone(),
            tx,
            call_timeout: self.call_timeout,
            analytics: None,
            sweep_stop: self.sweep_stop.clone(),
        })
    }
}

impl CacheStore {
    // == Constructor ==
    /// Spawns the owner task and the periodic sweep for a new store.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(name: impl Into<String>, config: &StoreConfig, clock: SharedClock) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
        tokio::spawn(run_owner(name.clone(), rx, clock));

        let store = Self {
            name,
            tx,
            call_timeout: config.call_timeout,
            analytics: None,
            sweep_stop: StopFlag::new(),
        };
        spawn_sweep_task(store.downgrade(), config.sweep_interval, store.sweep_stop.clone());
        info!(store = %store.name, "Cache store started");
        store
    }

    /// Returns a handle that reports every operation to `collector`.
    pub fn with_analytics(mut self, collector: AnalyticsCollector) -> Self {
        self.analytics = Some(collector);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn downgrade(&self) -> WeakCacheStore {
        WeakCacheStore {
            name: self.name.clone(),
            tx: self.tx.downgrade(),
            call_timeout: self.call_timeout,
            sweep_stop: self.sweep_stop.clone(),
        }
    }

    /// Returns true while the owner task accepts commands.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    // == Get ==
    /// Retrieves a value; absent or expired keys yield `NotFound`.
    pub async fn get(&self, key: &str) -> Result<Value> {
        let started = Instant::now();
        let result = self
            .call(|reply| Command::Get {
                key: key.to_string(),
                reply,
            })
            .await
            .and_then(|inner| inner);
        self.record("get", key, read_outcome(&result), started);
        result
    }

    /// Retrieves and deserializes a value.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key).await?;
        Ok(serde_json::from_value(value)?)
    }

    // == Multi Get ==
    /// Retrieves several keys in one round trip, preserving input order.
    pub async fn mget(&self, keys: &[String]) -> Result<Vec<Result<Value>>> {
        let started = Instant::now();
        let results = self
            .call(|reply| Command::MultiGet {
                keys: keys.to_vec(),
                reply,
            })
            .await;
        match &results {
            Ok(values) => {
                for (key, value) in keys.iter().zip(values) {
                    self.record("mget", key, read_outcome(value), started);
                }
            }
            Err(_) => {
                for key in keys {
                    self.record("mget", key, OperationResult::Error, started);
                }
            }
        }
        results
    }

    // == Set ==
    /// Stores a value. `None` never expires; a zero TTL is stored already expired.
    pub async fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) -> Result<()> {
        let key = key.into();
        let started = Instant::now();
        let result = self
            .call(|reply| Command::Set {
                key: key.clone(),
                value,
                ttl,
                reply,
            })
            .await;
        self.record("set", &key, write_outcome(&result), started);
        result
    }

    /// Serializes and stores a value.
    pub async fn set_as<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value, ttl).await
    }

    /// Stores a value that never expires.
    pub async fn put(&self, key: impl Into<String>, value: Value) -> Result<()> {
        self.set(key, value, None).await
    }

    /// Stores several values with a shared TTL. Returns the number written.
    pub async fn mset(&self, items: Vec<(String, Value)>, ttl: Option<Duration>) -> Result<usize> {
        let started = Instant::now();
        let keys: Vec<String> = items.iter().map(|(key, _)| key.clone()).collect();
        let result = self
            .call(|reply| Command::SetMany { items, ttl, reply })
            .await;
        let outcome = write_outcome(&result);
        for key in &keys {
            self.record("mset", key, outcome, started);
        }
        result
    }

    /// Atomically stores the value if no live entry exists. Returns true if written.
    pub async fn insert_if_absent(
        &self,
        key: impl Into<String>,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<bool> {
        let key = key.into();
        let started = Instant::now();
        let result = self
            .call(|reply| Command::InsertIfAbsent {
                key: key.clone(),
                value,
                ttl,
                reply,
            })
            .await;
        self.record("insert_if_absent", &key, write_outcome(&result), started);
        result
    }

    // == Get And Update ==
    /// Atomically replaces the value under `key` with `update(current)`.
    ///
    /// Returns the previous live value (if any) and the stored value. A live
    /// entry keeps its expiry; a new entry never expires.
    pub async fn get_and_update<F>(&self, key: &str, update: F) -> Result<(Option<Value>, Value)>
    where
        F: FnOnce(Option<&Value>) -> Value + Send + 'static,
    {
        let started = Instant::now();
        let result = self
            .call(|reply| Command::Update {
                key: key.to_string(),
                update: Box::new(update),
                reply,
            })
            .await
            .and_then(|inner| inner);
        self.record("get_and_update", key, write_outcome(&result), started);
        result
    }

    // == Exists ==
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let started = Instant::now();
        let result = self
            .call(|reply| Command::Exists {
                key: key.to_string(),
                reply,
            })
            .await;
        self.record("exists", key, write_outcome(&result), started);
        result
    }

    // == Delete ==
    /// Removes a key; absent or expired keys yield `NotFound`.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let started = Instant::now();
        let result = self
            .call(|reply| Command::Delete {
                key: key.to_string(),
                reply,
            })
            .await
            .and_then(|inner| inner);
        let outcome = match &result {
            Err(CacheError::StoreUnavailable(_)) => OperationResult::Error,
            _ => OperationResult::Ok,
        };
        self.record("delete", key, outcome, started);
        result
    }

    /// Removes every key starting with `prefix`. Returns the number removed.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let started = Instant::now();
        let result = self
            .call(|reply| Command::DeletePrefix {
                prefix: prefix.to_string(),
                reply,
            })
            .await;
        self.record("delete_prefix", prefix, write_outcome(&result), started);
        result
    }

    /// Removes every entry.
    pub async fn clear(&self) -> Result<()> {
        let started = Instant::now();
        let result = self.call(|reply| Command::Clear { reply }).await;
        self.record("clear", &self.name, write_outcome(&result), started);
        result
    }

    // == Maintenance ==
    /// Removes all expired entries now. Returns the number removed.
    pub async fn sweep_expired(&self) -> Result<usize> {
        self.call(|reply| Command::Sweep { reply }).await
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.call(|reply| Command::Stats { reply }).await
    }

    /// Number of physically present entries.
    pub async fn len(&self) -> Result<usize> {
        Ok(self.stats().await?.total_entries)
    }

    /// Stops the sweep and the owner task. Later calls fail with `StoreUnavailable`.
    pub async fn shutdown(&self) {
        self.sweep_stop.stop();
        if self.tx.send(Command::Shutdown).await.is_err() {
            debug!(store = %self.name, "Cache store already stopped");
        }
    }

    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        let request = async {
            self.tx
                .send(build(reply))
                .await
                .map_err(|_| self.unavailable("owner task is not running"))?;
            response
                .await
                .map_err(|_| self.unavailable("owner task dropped the request"))
        };
        match timeout(self.call_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(self.unavailable(&format!(
                "call timed out after {}ms",
                self.call_timeout.as_millis()
            ))),
        }
    }

    fn unavailable(&self, reason: &str) -> CacheError {
        CacheError::StoreUnavailable(format!("{}: {}", self.name, reason))
    }

    fn record(&self, operation: &str, key: &str, result: OperationResult, started: Instant) {
        if let Some(analytics) = &self.analytics {
            let mut metadata = BTreeMap::new();
            metadata.insert("store".to_string(), self.name.to_string());
            analytics.record_operation(
                operation,
                key,
                result,
                started.elapsed().as_secs_f64() * 1000.0,
                metadata,
            );
        }
    }
}

/// Expired-but-present entries surface as `NotFound` and therefore count as misses.
fn read_outcome<T>(result: &Result<T>) -> OperationResult {
    match result {
        Ok(_) => OperationResult::Hit,
        Err(CacheError::NotFound(_)) => OperationResult::Miss,
        Err(_) => OperationResult::Error,
    }
}

/// Outcome for every operation other than a value read.
fn write_outcome<T>(result: &Result<T>) -> OperationResult {
    match result {
        Ok(_) => OperationResult::Ok,
        Err(_) => OperationResult::Error,
    }
}

// == Owner Task ==
async fn run_owner(name: Arc<str>, mut rx: mpsc::Receiver<Command>, clock: SharedClock) {
    let mut table = CacheTable::new();

    while let Some(command) = rx.recv().await {
        let now = clock.now_ms();
        // Replies are dropped silently when the caller gave up (timeout).
        match command {
            Command::Get { key, reply } => {
                let _ = reply.send(table.get(&key, now));
            }
            Command::MultiGet { keys, reply } => {
                let _ = reply.send(table.get_many(&keys, now));
            }
            Command::Set {
                key,
                value,
                ttl,
                reply,
            } => {
                table.set(key, value, Expiry::from_ttl(ttl, now));
                let _ = reply.send(());
            }
            Command::SetMany { items, ttl, reply } => {
                let written = table.set_many(items, Expiry::from_ttl(ttl, now));
                let _ = reply.send(written);
            }
            Command::InsertIfAbsent {
                key,
                value,
                ttl,
                reply,
            } => {
                let inserted = table.insert_if_absent(key, value, Expiry::from_ttl(ttl, now), now);
                let _ = reply.send(inserted);
            }
            Command::Update { key, update, reply } => {
                let result = table.get_and_update(&key, update, now);
                if let Err(err) = &result {
                    warn!(store = %name, error = %err, "Update function panicked");
                }
                let _ = reply.send(result);
            }
            Command::Exists { key, reply } => {
                let _ = reply.send(table.exists(&key, now));
            }
            Command::Delete { key, reply } => {
                let _ = reply.send(table.delete(&key, now));
            }
            Command::DeletePrefix { prefix, reply } => {
                let _ = reply.send(table.delete_prefix(&prefix));
            }
            Command::Clear { reply } => {
                table.clear();
                let _ = reply.send(());
            }
            Command::Sweep { reply } => {
                let _ = reply.send(table.cleanup_expired(now));
            }
            Command::Stats { reply } => {
                let _ = reply.send(table.stats());
            }
            Command::Shutdown => break,
        }
    }

    info!(store = %name, entries = table.len(), "Cache store stopped");
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use serde_json::json;
    use tokio_test::assert_ok;

    fn test_store(clock: &ManualClock) -> CacheStore {
        CacheStore::start("test", &StoreConfig::default(), Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn test_store_set_and_get() {
        let clock = ManualClock::new(0);
        let store = test_store(&clock);

        assert_ok!(store.set("esi:character:1", json!({"name": "Foo"}), None).await);
        assert_eq!(store.get("esi:character:1").await.unwrap(), json!({"name": "Foo"}));
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_ttl_with_simulated_clock() {
        let clock = ManualClock::new(1_000);
        let store = test_store(&clock);

        store
            .set("k", json!(1), Some(Duration::from_millis(500)))
            .await
            .unwrap();
        clock.advance(Duration::from_millis(499));
        assert!(store.get("k").await.is_ok());

        clock.advance(Duration::from_millis(1));
        assert!(matches!(store.get("k").await, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_store_zero_ttl_is_miss() {
        let clock = ManualClock::new(0);
        let store = test_store(&clock);

        store.set("k", json!(1), Some(Duration::ZERO)).await.unwrap();
        assert!(matches!(store.get("k").await, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_store_put_never_expires() {
        let clock = ManualClock::new(0);
        let store = test_store(&clock);

        store.put("config:value:x", json!("y")).await.unwrap();
        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert_eq!(store.get("config:value:x").await.unwrap(), json!("y"));
    }

    #[tokio::test]
    async fn test_store_typed_roundtrip() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Character {
            name: String,
        }

        let clock = ManualClock::new(0);
        let store = test_store(&clock);
        let character = Character { name: "Foo".into() };

        store.set_as("esi:character:1", &character, None).await.unwrap();
        let loaded: Character = store.get_as("esi:character:1").await.unwrap();
        assert_eq!(loaded, character);

        let wrong: Result<u64> = store.get_as("esi:character:1").await;
        assert!(matches!(wrong, Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_store_delete_and_exists() {
        let clock = ManualClock::new(0);
        let store = test_store(&clock);

        store.put("k", json!(1)).await.unwrap();
        assert!(store.exists("k").await.unwrap());

        store.delete("k").await.unwrap();
        assert!(!store.exists("k").await.unwrap());
        assert!(matches!(store.delete("k").await, Err(CacheError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_store_clear_and_prefix_delete() {
        let clock = ManualClock::new(0);
        let store = test_store(&clock);

        store
            .mset(
                vec![
                    ("dedup:killmail:1".into(), json!(true)),
                    ("dedup:killmail:2".into(), json!(true)),
                    ("esi:system:1".into(), json!({})),
                ],
                None,
            )
            .await
            .unwrap();

        assert_eq!(store.delete_prefix("dedup:killmail:").await.unwrap(), 2);
        assert_eq!(store.len().await.unwrap(), 1);

        store.clear().await.unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_mget() {
        let clock = ManualClock::new(0);
        let store = test_store(&clock);
        store.put("a", json!(1)).await.unwrap();

        let results = store
            .mget(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(results[0].as_ref().unwrap(), &json!(1));
        assert!(matches!(results[1], Err(CacheError::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_get_and_update_is_linearized() {
        let clock = ManualClock::new(0);
        let store = test_store(&clock);
        store.put("counter", json!(0)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..1_000 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .get_and_update("counter", |current| {
                        json!(current.and_then(Value::as_u64).unwrap_or(0) + 1)
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.get("counter").await.unwrap(), json!(1_000));
    }

    #[tokio::test]
    async fn test_store_unavailable_after_shutdown() {
        let clock = ManualClock::new(0);
        let store = test_store(&clock);
        store.put("k", json!(1)).await.unwrap();

        store.shutdown().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!store.is_running());
        assert!(matches!(store.get("k").await, Err(CacheError::StoreUnavailable(_))));
        assert!(matches!(store.put("k", json!(2)).await, Err(CacheError::StoreUnavailable(_))));
        assert!(matches!(store.clear().await, Err(CacheError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_store_huge_ttl_is_not_expired() {
        let clock = ManualClock::new(1_000);
        let store = test_store(&clock);

        store
            .set("k", json!(1), Some(Duration::from_secs(1 << 62)))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_store_survives_panicking_update() {
        let clock = ManualClock::new(0);
        let store = test_store(&clock);
        store.put("a", json!(1)).await.unwrap();

        let result = store.get_and_update("b", |_| panic!("bad update")).await;
        assert!(matches!(result, Err(CacheError::UpdateFailed(_))));

        assert!(store.is_running());
        assert_eq!(store.get("a").await.unwrap(), json!(1));
        assert!(!store.exists("b").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_store_call_times_out() {
        let clock = ManualClock::new(0);
        let config = StoreConfig {
            call_timeout: Duration::from_millis(50),
            ..StoreConfig::default()
        };
        let store = CacheStore::start("slow", &config, Arc::new(clock));

        // Block the owner task inside an update so the next call waits in the queue.
        let blocker = store.clone();
        tokio::spawn(async move {
            let _ = blocker
                .get_and_update("k", |_| {
                    std::thread::sleep(Duration::from_millis(300));
                    json!(1)
                })
                .await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let result = store.get("k").await;
        assert!(matches!(result, Err(CacheError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_store_records_analytics() {
        let clock = ManualClock::new(0);
        let collector = AnalyticsCollector::start(
            crate::config::AnalyticsConfig::default(),
            Arc::new(clock.clone()),
        );
        let store = test_store(&clock).with_analytics(collector.clone());

        store.put("esi:character:1", json!(1)).await.unwrap();
        store.get("esi:character:1").await.unwrap();
        let _ = store.get("esi:character:2").await;

        let usage = collector.get_usage_report().await;
        assert_eq!(usage.total_operations, 3);
        assert_eq!(usage.hit_count, 1);
        assert_eq!(usage.miss_count, 1);
        assert!(usage.data_types.contains_key("character"));
    }
}

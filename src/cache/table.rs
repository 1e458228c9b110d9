//! Cache Table Module
//!
//! Single-owner key/value table with TTL expiry. The table itself is not
//! synchronized; `CacheStore` gives one task exclusive ownership of it.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::Value;

use crate::cache::{CacheEntry, CacheStats, Expiry};
use crate::error::{CacheError, Result};

// == Cache Table ==
/// HashMap storage with lazy and swept TTL expiry.
#[derive(Debug, Default)]
pub struct CacheTable {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Store counters
    stats: CacheStats,
}

impl CacheTable {
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// Expired entries are removed and counted as misses.
    pub fn get(&mut self, key: &str, now_ms: u64) -> Result<Value> {
        self.evict_if_expired(key, now_ms);
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.record_hit();
                Ok(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                Err(CacheError::NotFound(key.to_string()))
            }
        }
    }

    /// Retrieves several keys, preserving input order.
    pub fn get_many(&mut self, keys: &[String], now_ms: u64) -> Vec<Result<Value>> {
        keys.iter().map(|key| self.get(key, now_ms)).collect()
    }

    // == Set ==
    /// Stores a value, overwriting any existing entry and its expiry.
    pub fn set(&mut self, key: String, value: Value, expiry: Expiry) {
        self.entries.insert(key, CacheEntry::new(value, expiry));
        self.stats.record_writes(1);
        self.sync_len();
    }

    /// Stores several values with a shared expiry. Returns the number written.
    pub fn set_many(&mut self, items: Vec<(String, Value)>, expiry: Expiry) -> usize {
        let count = items.len();
        for (key, value) in items {
            self.entries.insert(key, CacheEntry::new(value, expiry));
        }
        self.stats.record_writes(count as u64);
        self.sync_len();
        count
    }

    /// Stores the value only when no live entry exists. Returns true if written.
    pub fn insert_if_absent(&mut self, key: String, value: Value, expiry: Expiry, now_ms: u64) -> bool {
        self.evict_if_expired(&key, now_ms);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.set(key, value, expiry);
        true
    }

    // == Get And Update ==
    /// Replaces the value under `key` with `update(current)`.
    ///
    /// A live entry keeps its expiry; a new entry never expires. Returns the
    /// previous live value and the stored value.
    /// A panicking `update` leaves the entry untouched and yields `UpdateFailed`.
    pub fn get_and_update<F>(
        &mut self,
        key: &str,
        update: F,
        now_ms: u64,
    ) -> Result<(Option<Value>, Value)>
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        self.evict_if_expired(key, now_ms);
        let (previous, expiry) = match self.entries.get(key) {
            Some(entry) => (Some(entry.value.clone()), entry.expiry),
            None => (None, Expiry::Never),
        };
        let next = catch_unwind(AssertUnwindSafe(|| update(previous.as_ref())))
            .map_err(|_| CacheError::UpdateFailed(key.to_string()))?;
        self.set(key.to_string(), next.clone(), expiry);
        Ok((previous, next))
    }

    // == Exists ==
    pub fn exists(&mut self, key: &str, now_ms: u64) -> bool {
        self.evict_if_expired(key, now_ms);
        self.entries.contains_key(key)
    }

    // == Delete ==
    /// Removes an entry by key; an expired entry counts as absent.
    pub fn delete(&mut self, key: &str, now_ms: u64) -> Result<()> {
        self.evict_if_expired(key, now_ms);
        if self.entries.remove(key).is_some() {
            self.stats.record_deletes(1);
            self.sync_len();
            Ok(())
        } else {
            Err(CacheError::NotFound(key.to_string()))
        }
    }

    /// Removes every entry whose key starts with `prefix`.
    pub fn delete_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - self.entries.len();
        self.stats.record_deletes(removed as u64);
        self.sync_len();
        removed
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        let removed = self.entries.len();
        self.entries.clear();
        self.stats.record_deletes(removed as u64);
        self.sync_len();
    }

    // == Cleanup Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn cleanup_expired(&mut self, now_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now_ms));
        let removed = before - self.entries.len();
        self.stats.record_expirations(removed as u64);
        self.sync_len();
        removed
    }

    /// Number of physically present entries, including expired-but-unswept ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    fn evict_if_expired(&mut self, key: &str, now_ms: u64) {
        let expired = self
            .entries
            .get(key)
            .map_or(false, |entry| entry.is_expired(now_ms));
        if expired {
            self.entries.remove(key);
            self.stats.record_expirations(1);
            self.sync_len();
        }
    }

    fn sync_len(&mut self) {
        self.stats.set_total_entries(self.entries.len());
    }
}

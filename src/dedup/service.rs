//! Deduplication Service
//!
//! Check-and-mark semantics on top of a cache store. Every storage failure is
//! treated as "already seen" so an event is never processed twice.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheStore, TtlPolicy};
use crate::dedup::DedupKind;
use crate::error::Result;

/// Result of `check_and_mark`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupOutcome {
    /// First sighting within the window; the caller should process the event
    New,
    /// Seen within the window, or the mark could not be written
    Duplicate,
}

impl DedupOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, DedupOutcome::New)
    }
}

/// Duplicate suppression backed by a cache store.
#[derive(Debug, Clone)]
pub struct DeduplicationService {
    store: CacheStore,
    ttl: TtlPolicy,
}

impl DeduplicationService {
    pub fn new(store: CacheStore, ttl: TtlPolicy) -> Self {
        Self { store, ttl }
    }

    /// Returns true if `id` was marked within the kind's window.
    ///
    /// A store failure reports `true`.
    pub async fn is_duplicate(&self, kind: DedupKind, id: impl fmt::Display) -> bool {
        let key = kind.key_for(id);
        match self.store.exists(&key).await {
            Ok(seen) => seen,
            Err(err) => {
                warn!(kind = %kind, key = %key, error = %err, "Dedup lookup failed, treating as duplicate");
                true
            }
        }
    }

    /// Marks `id` as processed for the kind's window.
    pub async fn mark_processed(&self, kind: DedupKind, id: impl fmt::Display) -> Result<()> {
        let key = kind.key_for(id);
        self.store
            .set(key, Value::Bool(true), Some(self.ttl.dedup_ttl(kind)))
            .await
    }

    /// Atomically checks and marks `id`.
    ///
    /// Exactly one caller per window receives `New`; a failed mark write
    /// yields `Duplicate`.
    pub async fn check_and_mark(&self, kind: DedupKind, id: impl fmt::Display) -> DedupOutcome {
        let key = kind.key_for(id);
        let ttl = Some(self.ttl.dedup_ttl(kind));

        match self.store.insert_if_absent(key.clone(), Value::Bool(true), ttl).await {
            Ok(true) => DedupOutcome::New,
            Ok(false) => {
                debug!(kind = %kind, key = %key, "Duplicate suppressed");
                DedupOutcome::Duplicate
            }
            Err(err) => {
                warn!(kind = %kind, key = %key, error = %err, "Dedup mark failed, treating as duplicate");
                DedupOutcome::Duplicate
            }
        }
    }

    /// Forgets every record of a kind. Returns the number removed.
    pub async fn clear_duplicates(&self, kind: DedupKind) -> Result<usize> {
        let prefix = format!("{}:", kind.prefix());
        let removed = self.store.delete_prefix(&prefix).await?;
        debug!(kind = %kind, removed, "Cleared dedup records");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::cache::ManualClock;
    use crate::config::StoreConfig;

    fn service(clock: &ManualClock) -> (DeduplicationService, CacheStore) {
        let store = CacheStore::start("dedup", &StoreConfig::default(), Arc::new(clock.clone()));
        (DeduplicationService::new(store.clone(), TtlPolicy::new()), store)
    }

    #[tokio::test]
    async fn test_check_and_mark_window() {
        let clock = ManualClock::new(0);
        let (dedup, _store) = service(&clock);

        assert_eq!(dedup.check_and_mark(DedupKind::Killmail, "123").await, DedupOutcome::New);
        assert_eq!(dedup.check_and_mark(DedupKind::Killmail, "123").await, DedupOutcome::Duplicate);

        clock.advance(Duration::from_secs(4 * 60 + 59));
        assert_eq!(dedup.check_and_mark(DedupKind::Killmail, "123").await, DedupOutcome::Duplicate);

        clock.advance(Duration::from_secs(1));
        assert_eq!(dedup.check_and_mark(DedupKind::Killmail, "123").await, DedupOutcome::New);
    }

    #[tokio::test]
    async fn test_kinds_do_not_collide() {
        let clock = ManualClock::new(0);
        let (dedup, _store) = service(&clock);

        assert!(dedup.check_and_mark(DedupKind::Killmail, 1).await.is_new());
        assert!(dedup.check_and_mark(DedupKind::NotificationKill, 1).await.is_new());
        assert!(dedup.check_and_mark(DedupKind::WebsocketDedup, 1).await.is_new());
    }

    #[tokio::test]
    async fn test_mark_processed_and_is_duplicate() {
        let clock = ManualClock::new(0);
        let (dedup, _store) = service(&clock);

        assert!(!dedup.is_duplicate(DedupKind::StatusReport, "daily").await);
        dedup.mark_processed(DedupKind::StatusReport, "daily").await.unwrap();
        assert!(dedup.is_duplicate(DedupKind::StatusReport, "daily").await);

        clock.advance(Duration::from_secs(60));
        assert!(!dedup.is_duplicate(DedupKind::StatusReport, "daily").await);
    }

    #[tokio::test]
    async fn test_clear_duplicates_only_touches_kind() {
        let clock = ManualClock::new(0);
        let (dedup, _store) = service(&clock);

        dedup.mark_processed(DedupKind::NotificationSystem, 1).await.unwrap();
        dedup.mark_processed(DedupKind::NotificationSystem, 2).await.unwrap();
        dedup.mark_processed(DedupKind::NotificationCharacter, 1).await.unwrap();

        assert_eq!(dedup.clear_duplicates(DedupKind::NotificationSystem).await.unwrap(), 2);
        assert!(!dedup.is_duplicate(DedupKind::NotificationSystem, 1).await);
        assert!(dedup.is_duplicate(DedupKind::NotificationCharacter, 1).await);
    }

    #[tokio::test]
    async fn test_fails_closed_when_store_is_down() {
        let clock = ManualClock::new(0);
        let (dedup, store) = service(&clock);
        store.shutdown().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(dedup.check_and_mark(DedupKind::Killmail, "9").await, DedupOutcome::Duplicate);
        assert!(dedup.is_duplicate(DedupKind::Killmail, "9").await);
        assert!(dedup.mark_processed(DedupKind::Killmail, "9").await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_check_and_mark_has_single_winner() {
        let clock = ManualClock::new(0);
        let (dedup, _store) = service(&clock);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let dedup = dedup.clone();
            handles.push(tokio::spawn(async move {
                dedup.check_and_mark(DedupKind::NotificationRally, "rally-1").await
            }));
        }

        let mut new_count = 0;
        for handle in handles {
            if handle.await.unwrap().is_new() {
                new_count += 1;
            }
        }
        assert_eq!(new_count, 1);
    }
}

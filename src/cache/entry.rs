//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use serde_json::Value;

// == Expiry ==
/// Absolute expiration of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Entry never expires
    Never,
    /// Entry expires at this Unix timestamp (milliseconds)
    At(u64),
}

impl Expiry {
    /// Converts a relative TTL into an absolute expiry.
    ///
    /// `None` never expires. A zero TTL expires at `now`, so the entry is
    /// already expired when stored.
    pub fn from_ttl(ttl: Option<Duration>, now_ms: u64) -> Self {
        match ttl {
            None => Expiry::Never,
            Some(ttl) => {
                let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
                Expiry::At(now_ms.saturating_add(ttl_ms))
            }
        }
    }
}

// == Cache Entry ==
/// Represents a single cache entry with its value and expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: Value,
    /// Expiration of the entry
    pub expiry: Expiry,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry.
    pub fn new(value: Value, expiry: Expiry) -> Self {
        Self { value, expiry }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now_ms`.
    ///
    /// An entry is expired once the current time is greater than or equal to
    /// its expiration time.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        match self.expiry {
            Expiry::At(expires) => now_ms >= expires,
            Expiry::Never => false,
        }
    }
}

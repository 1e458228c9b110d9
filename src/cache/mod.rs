//! Cache Module
//!
//! Provides in-process key/value stores with TTL expiry, canonical key
//! handling and the TTL lookup table.

mod clock;
mod entry;
mod key;
mod registry;
mod stats;
mod store;
mod table;
mod ttl;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SharedClock, SystemClock};
pub use entry::{CacheEntry, Expiry};
pub use key::{CacheKey, Namespace, SEPARATOR};
pub use registry::StoreRegistry;
pub use stats::CacheStats;
pub use store::{CacheStore, WeakCacheStore};
pub use table::CacheTable;
pub use ttl::{DataType, TtlPolicy};

//! TTL Policy Module
//!
//! Maps the closed set of cached data types and dedup kinds to TTL durations.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::cache::Namespace;
use crate::dedup::DedupKind;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);

// == Data Type ==
/// Kinds of data cached on behalf of collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Character,
    Corporation,
    Alliance,
    System,
    ItemType,
    Killmail,
    MapData,
    License,
    Config,
}

impl DataType {
    pub const ALL: [DataType; 9] = [
        DataType::Character,
        DataType::Corporation,
        DataType::Alliance,
        DataType::System,
        DataType::ItemType,
        DataType::Killmail,
        DataType::MapData,
        DataType::License,
        DataType::Config,
    ];

    /// Looks up a data type by its entity segment, e.g. `"killmail"`.
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|data_type| data_type.key_segments().1 == segment)
    }

    /// Namespace and entity segment used in canonical keys.
    pub fn key_segments(&self) -> (Namespace, &'static str) {
        match self {
            DataType::Character => (Namespace::Esi, "character"),
            DataType::Corporation => (Namespace::Esi, "corporation"),
            DataType::Alliance => (Namespace::Esi, "alliance"),
            DataType::System => (Namespace::Esi, "system"),
            DataType::ItemType => (Namespace::Esi, "type"),
            DataType::Killmail => (Namespace::Esi, "killmail"),
            DataType::MapData => (Namespace::Map, "data"),
            DataType::License => (Namespace::License, "status"),
            DataType::Config => (Namespace::Config, "value"),
        }
    }

    /// Default TTL, `None` meaning the entry never expires.
    pub fn default_ttl(&self) -> Option<Duration> {
        match self {
            DataType::Character | DataType::Corporation | DataType::Alliance => Some(24 * HOUR),
            DataType::System => Some(HOUR),
            DataType::ItemType => Some(24 * HOUR),
            DataType::Killmail => Some(30 * MINUTE),
            DataType::MapData => Some(HOUR),
            DataType::License => Some(20 * MINUTE),
            DataType::Config => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_segments().1)
    }
}

// == TTL Policy ==
/// TTL lookup table injected at construction.
///
/// Starts from the built-in defaults; individual entries can be overridden
/// per instance.
#[derive(Debug, Clone, Default)]
pub struct TtlPolicy {
    data_overrides: HashMap<DataType, Option<Duration>>,
    dedup_overrides: HashMap<DedupKind, Duration>,
}

impl TtlPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the TTL for a data type.
    pub fn with_data_ttl(mut self, data_type: DataType, ttl: Option<Duration>) -> Self {
        self.data_overrides.insert(data_type, ttl);
        self
    }

    /// Overrides the TTL for a dedup kind.
    pub fn with_dedup_ttl(mut self, kind: DedupKind, ttl: Duration) -> Self {
        self.dedup_overrides.insert(kind, ttl);
        self
    }

    pub fn ttl_for(&self, data_type: DataType) -> Option<Duration> {
        self.data_overrides
            .get(&data_type)
            .copied()
            .unwrap_or_else(|| data_type.default_ttl())
    }

    pub fn dedup_ttl(&self, kind: DedupKind) -> Duration {
        self.dedup_overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_ttl())
    }
}

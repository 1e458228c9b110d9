//! Cache Key Module
//!
//! Builds and parses canonical `namespace:entityType:id[:extra]` key strings.

use std::fmt;
use std::str::FromStr;

use crate::cache::DataType;
use crate::error::{CacheError, Result};

/// Segment separator in canonical keys.
pub const SEPARATOR: char = ':';

// == Namespace ==
/// Canonical key namespaces used across the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Esi,
    Tracking,
    Map,
    Data,
    Notification,
    WebsocketDedup,
    Dedup,
    Config,
    StatusReport,
    Scheduler,
    Entity,
    Janice,
    License,
}

impl Namespace {
    pub const ALL: [Namespace; 13] = [
        Namespace::Esi,
        Namespace::Tracking,
        Namespace::Map,
        Namespace::Data,
        Namespace::Notification,
        Namespace::WebsocketDedup,
        Namespace::Dedup,
        Namespace::Config,
        Namespace::StatusReport,
        Namespace::Scheduler,
        Namespace::Entity,
        Namespace::Janice,
        Namespace::License,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Esi => "esi",
            Namespace::Tracking => "tracking",
            Namespace::Map => "map",
            Namespace::Data => "data",
            Namespace::Notification => "notification",
            Namespace::WebsocketDedup => "websocket_dedup",
            Namespace::Dedup => "dedup",
            Namespace::Config => "config",
            Namespace::StatusReport => "status_report",
            Namespace::Scheduler => "scheduler",
            Namespace::Entity => "entity",
            Namespace::Janice => "janice",
            Namespace::License => "license",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        Namespace::ALL
            .iter()
            .copied()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| CacheError::InvalidKey(format!("unknown namespace '{}'", s)))
    }
}

// == Cache Key ==
/// Structured form of a canonical cache key.
///
/// `id` is optional so that two-segment keys such as `esi:character` (used as
/// prefixes) parse; `extra` holds everything after the third separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: String,
    pub entity_type: String,
    pub id: Option<String>,
    pub extra: Option<String>,
}

impl CacheKey {
    // == Build ==
    /// Builds a `namespace:entity_type:id` key, validating every segment.
    pub fn new(
        namespace: impl Into<String>,
        entity_type: impl Into<String>,
        id: impl fmt::Display,
    ) -> Result<Self> {
        let key = Self {
            namespace: namespace.into(),
            entity_type: entity_type.into(),
            id: Some(id.to_string()),
            extra: None,
        };
        key.validate()?;
        Ok(key)
    }

    /// Appends an `extra` suffix (may contain separators).
    pub fn with_extra(mut self, extra: impl Into<String>) -> Result<Self> {
        self.extra = Some(extra.into());
        self.validate()?;
        Ok(self)
    }

    /// Key for an entity of a cached data type, e.g. `esi:character:95465499`.
    pub fn for_entity(data_type: DataType, id: impl fmt::Display) -> Result<Self> {
        let (namespace, entity_type) = data_type.key_segments();
        Self::new(namespace.as_str(), entity_type, id)
    }

    // == Parse ==
    /// Parses a canonical key string.
    ///
    /// Fewer than two segments or any empty segment is `InvalidKey`.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(4, SEPARATOR);
        let namespace = parts.next().unwrap_or_default();
        let entity_type = parts
            .next()
            .ok_or_else(|| CacheError::InvalidKey(format!("'{}' has fewer than two segments", raw)))?;
        let key = Self {
            namespace: namespace.to_string(),
            entity_type: entity_type.to_string(),
            id: parts.next().map(str::to_string),
            extra: parts.next().map(str::to_string),
        };
        key.validate().map_err(|_| {
            CacheError::InvalidKey(format!("'{}' contains an empty segment", raw))
        })?;
        Ok(key)
    }

    /// Returns the namespace if it is one of the canonical ones.
    pub fn canonical_namespace(&self) -> Option<Namespace> {
        self.namespace.parse().ok()
    }

    fn validate(&self) -> Result<()> {
        let fixed = [Some(&self.namespace), Some(&self.entity_type), self.id.as_ref()];
        for segment in fixed.into_iter().flatten() {
            if segment.is_empty() || segment.contains(SEPARATOR) {
                return Err(CacheError::InvalidKey(format!(
                    "segment '{}' must be non-empty and contain no '{}'",
                    segment, SEPARATOR
                )));
            }
        }
        if let Some(extra) = &self.extra {
            if self.id.is_none() || extra.split(SEPARATOR).any(str::is_empty) {
                return Err(CacheError::InvalidKey(format!("invalid extra segment '{}'", extra)));
            }
        }
        Ok(())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, SEPARATOR, self.entity_type)?;
        if let Some(id) = &self.id {
            write!(f, "{}{}", SEPARATOR, id)?;
        }
        if let Some(extra) = &self.extra {
            write!(f, "{}{}", SEPARATOR, extra)?;
        }
        Ok(())
    }
}

impl FromStr for CacheKey {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.to_string()
    }
}

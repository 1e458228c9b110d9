//! Analytics Event Types
//!
//! Operation events and the per-key / per-data-type counters derived from them.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::DataType;

/// Free-form tags attached to an operation event.
pub type Metadata = BTreeMap<String, String>;

/// Namespace segments recognised when classifying a key, checked in order.
const KNOWN_DATA_TYPES: [&str; 4] = ["character", "corporation", "alliance", "system"];

/// Metadata tag consulted when the key itself is not recognised. Only values
/// naming a known data type are used, which keeps the per-type map bounded.
pub const DATA_TYPE_TAG: &str = "data_type";

// == Operation Result ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationResult {
    Hit,
    Miss,
    Ok,
    Error,
}

// == Operation Event ==
/// One recorded cache or dedup operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationEvent {
    pub operation: String,
    pub key: String,
    pub result: OperationResult,
    pub duration_ms: f64,
    pub timestamp_ms: u64,
    pub metadata: Metadata,
}

impl OperationEvent {
    /// Data type of the event's key.
    pub fn data_type(&self) -> String {
        classify_data_type(&self.key, &self.metadata)
    }
}

/// Classifies a key by substring match against the known entity segments,
/// then by a recognised `data_type` metadata tag, else `unknown`.
pub fn classify_data_type(key: &str, metadata: &Metadata) -> String {
    KNOWN_DATA_TYPES
        .iter()
        .find(|segment| key.contains(*segment))
        .map(|segment| segment.to_string())
        .or_else(|| {
            metadata
                .get(DATA_TYPE_TAG)
                .and_then(|tag| DataType::from_segment(tag))
                .map(|data_type| data_type.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

// == Key Stats ==
/// Access counters for a single key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeyStats {
    pub access_count: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub total_duration_ms: f64,
    pub last_accessed_ms: u64,
    /// Access sequence number used for least-recently-accessed eviction
    #[serde(skip)]
    pub(crate) last_sequence: u64,
}

impl KeyStats {
    pub(crate) fn record(&mut self, event: &OperationEvent, sequence: u64) {
        self.access_count += 1;
        match event.result {
            OperationResult::Hit => self.hit_count += 1,
            OperationResult::Miss => self.miss_count += 1,
            OperationResult::Ok | OperationResult::Error => {}
        }
        self.total_duration_ms += event.duration_ms;
        self.last_accessed_ms = event.timestamp_ms;
        self.last_sequence = sequence;
    }

    pub fn hit_rate(&self) -> f64 {
        ratio(self.hit_count, self.hit_count + self.miss_count)
    }

    pub fn avg_duration_ms(&self) -> f64 {
        if self.access_count == 0 {
            0.0
        } else {
            self.total_duration_ms / self.access_count as f64
        }
    }
}

// == Data Type Stats ==
/// Counters aggregated per classified data type.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DataTypeStats {
    pub operations: u64,
    pub hits: u64,
    pub misses: u64,
    pub total_duration_ms: f64,
}

impl DataTypeStats {
    pub(crate) fn record(&mut self, event: &OperationEvent) {
        self.operations += 1;
        match event.result {
            OperationResult::Hit => self.hits += 1,
            OperationResult::Miss => self.misses += 1,
            OperationResult::Ok | OperationResult::Error => {}
        }
        self.total_duration_ms += event.duration_ms;
    }

    pub fn hit_rate(&self) -> f64 {
        ratio(self.hits, self.hits + self.misses)
    }
}

// == Time Series ==
/// Periodic snapshot of the global counters.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TimeSeriesSnapshot {
    pub timestamp_ms: u64,
    pub total_operations: u64,
    /// Operations recorded since the previous snapshot
    pub operations_in_interval: u64,
    pub hit_rate: f64,
    pub avg_response_time_ms: f64,
    pub tracked_keys: usize,
}

pub(crate) fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

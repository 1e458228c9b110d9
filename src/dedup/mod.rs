//! Deduplication Module
//!
//! Suppresses repeated processing of the same logical event within a
//! kind-specific time window.

mod kind;
mod service;

pub use kind::DedupKind;
pub use service::{DedupOutcome, DeduplicationService};

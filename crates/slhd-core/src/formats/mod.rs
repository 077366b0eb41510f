//! # Formats Module
//!
//! Serialization formats for bulk data loading.

mod snapshot;

pub use snapshot::{Snapshot, SnapshotReport};

//! Partitioned response cache for offline support.
//!
//! This module provides a request/response cache that:
//! - Stores response snapshots in named partitions
//! - Keys entries by method + URL, honouring `Vary` on lookup
//! - Supports all-or-nothing population of a partition
//! - Searches every partition for a global lookup

mod layer;
mod storage;
mod traits;

pub use layer::CacheStore;
pub use storage::{CacheStorage, MemoryStorage, SqliteStorage};
pub use traits::CachedResponse;

#[cfg(test)]
pub use traits::{EntrySummary, RequestKey, StoredEntry};

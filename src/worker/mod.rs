//! Offline-caching worker.
//!
//! - `version`: partition names per cache version and pruning of stale ones
//! - `classify`: ordered rules assigning each request a handling class
//! - `strategy`: network-first and cache-first responses with background write-back
//! - `lifecycle`: install / activate / fetch entry points

mod classify;
mod lifecycle;
mod strategy;
mod version;
mod writeback;

#[cfg(test)]
pub(crate) mod testing;

pub use lifecycle::Worker;
pub use strategy::{Served, ServedFrom};
pub use version::ActivationReport;

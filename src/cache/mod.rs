//! Date-partitioned caching layer.
//!
//! This module provides a Jira-agnostic cache that:
//! - Partitions entities by the calendar date of a chosen timestamp field
//! - Persists one batch per (year, month), mapping date -> entities
//! - Merges new fetches as a union over dates, never replacing whole months
//! - Works out which requested dates still need a network fetch

mod layer;
mod storage;
mod traits;

pub use layer::{FetchPlan, IssueCache};
pub use storage::{CacheStorage, JsonFileStorage};
pub use traits::{CacheResult, Cacheable};

#[cfg(test)]
pub(crate) use traits::{CacheSource, MonthBatch, MonthKey};

#[cfg(test)]
pub(crate) use storage::MemoryStorage;

//! Core traits and types for the caching system.

use chrono::{Datelike, Month, NaiveDate};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Trait for entities that can be cached in date-partitioned month batches.
///
/// Implementors provide a unique key and access to named timestamps. The
/// cache partitions on the calendar date of whichever timestamp the caller
/// asks for.
pub trait Cacheable: Clone + Send + Sync + Serialize + DeserializeOwned {
  /// Unique identifier for this entity (e.g. issue key)
  fn cache_key(&self) -> String;

  /// ISO 8601 timestamp stored under `field`, if present.
  fn timestamp(&self, field: &str) -> Option<&str>;

  /// Calendar date of the `field` timestamp, if it has one.
  fn partition_date(&self, field: &str) -> Option<NaiveDate> {
    let ts = self.timestamp(field)?;
    let day = ts.split('T').next()?;
    NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d").ok()
  }
}

/// Records of one month, keyed by calendar date.
pub type MonthBatch<T> = BTreeMap<NaiveDate, Vec<T>>;

/// Identifies one persisted month batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
  pub year: i32,
  pub month: u32,
}

impl MonthKey {
  pub fn of(date: NaiveDate) -> Self {
    Self {
      year: date.year(),
      month: date.month(),
    }
  }

  /// Lowercase English month name used as the directory name.
  pub fn dir_name(&self) -> String {
    u8::try_from(self.month)
      .ok()
      .and_then(|m| Month::try_from(m).ok())
      .map(|m| m.name().to_lowercase())
      .unwrap_or_else(|| format!("{:02}", self.month))
  }

  /// Inverse of [`MonthKey::dir_name`]. Matches the exact name only, since
  /// batches are always read back from the lowercase path.
  pub fn from_dir_name(year: i32, name: &str) -> Option<Self> {
    (1..=12u32)
      .map(|month| Self { year, month })
      .find(|key| key.dir_name() == name)
  }
}

impl fmt::Display for MonthKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{:02}", self.year, self.month)
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }

  pub fn merged(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Merged,
    }
  }
}

/// Indicates where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Everything fetched from the network
  Network,
  /// Every requested date was already cached
  Cache,
  /// Some dates from cache, the rest fetched
  Merged,
}

impl fmt::Display for CacheSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CacheSource::Network => write!(f, "network"),
      CacheSource::Cache => write!(f, "cache"),
      CacheSource::Merged => write!(f, "cache + network"),
    }
  }
}

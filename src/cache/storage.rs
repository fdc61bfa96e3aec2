//! Cache storage trait and the JSON file implementation.

use color_eyre::{eyre::eyre, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::traits::{Cacheable, MonthBatch, MonthKey};

const BATCH_FILE: &str = "issues.json";

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Load the batch for a month, `None` if it was never written.
  fn load_month<T: Cacheable>(&self, month: MonthKey) -> Result<Option<MonthBatch<T>>>;

  /// Replace the stored batch for a month.
  fn store_month<T: Cacheable>(&self, month: MonthKey, batch: &MonthBatch<T>) -> Result<()>;

  /// Months of `year` that have a stored batch, in calendar order.
  fn months_in_year(&self, year: i32) -> Result<Vec<MonthKey>>;

  /// Overlay `fresh` date entries onto the stored batch.
  ///
  /// Dates absent from `fresh` keep whatever was stored before.
  fn merge_month<T: Cacheable>(&self, month: MonthKey, fresh: MonthBatch<T>) -> Result<()> {
    let mut batch = self.load_month::<T>(month)?.unwrap_or_default();
    batch.extend(fresh);
    self.store_month(month, &batch)
  }
}

/// Stores month batches as pretty-printed JSON under
/// `<root>/<year>/<month-name>/issues.json`.
pub struct JsonFileStorage {
  root: PathBuf,
}

impl JsonFileStorage {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Storage for one project's issues below the raw data directory.
  pub fn for_project(raw_dir: &Path, project: &str) -> Self {
    Self::new(raw_dir.join(format!("{}_issues", project)))
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn batch_path(&self, month: MonthKey) -> PathBuf {
    self
      .root
      .join(month.year.to_string())
      .join(month.dir_name())
      .join(BATCH_FILE)
  }
}

impl CacheStorage for JsonFileStorage {
  fn load_month<T: Cacheable>(&self, month: MonthKey) -> Result<Option<MonthBatch<T>>> {
    let path = self.batch_path(month);
    if !path.exists() {
      return Ok(None);
    }

    let contents = fs::read_to_string(&path)
      .map_err(|e| eyre!("Failed to read cache file {}: {}", path.display(), e))?;
    let batch = serde_json::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse cache file {}: {}", path.display(), e))?;

    Ok(Some(batch))
  }

  fn store_month<T: Cacheable>(&self, month: MonthKey, batch: &MonthBatch<T>) -> Result<()> {
    let path = self.batch_path(month);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory {}: {}", parent.display(), e))?;
    }

    let data = serde_json::to_string_pretty(batch)
      .map_err(|e| eyre!("Failed to serialize month batch {}: {}", month, e))?;

    // Write beside the target and rename so readers never see a partial file
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data).map_err(|e| eyre!("Failed to write {}: {}", tmp.display(), e))?;
    fs::rename(&tmp, &path)
      .map_err(|e| eyre!("Failed to move {} into place: {}", path.display(), e))?;

    debug!(month = %month, dates = batch.len(), path = %path.display(), "stored month batch");
    Ok(())
  }

  fn months_in_year(&self, year: i32) -> Result<Vec<MonthKey>> {
    let year_dir = self.root.join(year.to_string());
    if !year_dir.is_dir() {
      return Ok(Vec::new());
    }

    let entries = fs::read_dir(&year_dir)
      .map_err(|e| eyre!("Failed to list {}: {}", year_dir.display(), e))?;

    let mut months = Vec::new();
    for entry in entries {
      let entry = entry.map_err(|e| eyre!("Failed to list {}: {}", year_dir.display(), e))?;
      let name = entry.file_name();
      let name = name.to_string_lossy();
      match MonthKey::from_dir_name(year, &name) {
        Some(key) if entry.path().join(BATCH_FILE).is_file() => months.push(key),
        Some(_) => {}
        None => debug!(entry = %name, "ignoring non-month entry in cache"),
      }
    }

    months.sort();
    Ok(months)
  }
}

/// In-memory storage holding serialized batches, for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStorage {
  batches: std::sync::Mutex<std::collections::BTreeMap<MonthKey, String>>,
}

#[cfg(test)]
impl CacheStorage for MemoryStorage {
  fn load_month<T: Cacheable>(&self, month: MonthKey) -> Result<Option<MonthBatch<T>>> {
    let batches = self
      .batches
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    batches
      .get(&month)
      .map(|data| serde_json::from_str(data).map_err(|e| eyre!("Bad batch {}: {}", month, e)))
      .transpose()
  }

  fn store_month<T: Cacheable>(&self, month: MonthKey, batch: &MonthBatch<T>) -> Result<()> {
    let data = serde_json::to_string(batch)?;
    self
      .batches
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .insert(month, data);
    Ok(())
  }

  fn months_in_year(&self, year: i32) -> Result<Vec<MonthKey>> {
    let batches = self
      .batches
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(batches.keys().filter(|k| k.year == year).copied().collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::test_support::{date, entry, Entry};

  fn batch(dates: &[&str]) -> MonthBatch<Entry> {
    dates
      .iter()
      .map(|d| (date(d), vec![entry(&format!("K-{}", d), d)]))
      .collect()
  }

  #[test]
  fn test_file_layout_uses_year_and_month_name() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::for_project(dir.path(), "PROJ");
    let month = MonthKey { year: 2024, month: 1 };

    storage.store_month(month, &batch(&["2024-01-02"])).unwrap();

    let path = dir.path().join("PROJ_issues/2024/january/issues.json");
    assert!(path.is_file());
    let raw: serde_json::Value =
      serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert!(raw.get("2024-01-02").unwrap().is_array());
  }

  #[test]
  fn test_missing_month_loads_none() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path());
    let loaded = storage
      .load_month::<Entry>(MonthKey { year: 2024, month: 3 })
      .unwrap();
    assert!(loaded.is_none());
  }

  #[test]
  fn test_merge_keeps_untouched_dates() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path());
    let month = MonthKey { year: 2024, month: 1 };
    let original = batch(&[
      "2024-01-01",
      "2024-01-02",
      "2024-01-03",
      "2024-01-04",
      "2024-01-05",
    ]);
    storage.store_month(month, &original).unwrap();

    let mut fresh = MonthBatch::new();
    fresh.insert(
      date("2024-01-03"),
      vec![entry("NEW-1", "2024-01-03"), entry("NEW-2", "2024-01-03")],
    );
    storage.merge_month(month, fresh).unwrap();

    let merged = storage.load_month::<Entry>(month).unwrap().unwrap();
    assert_eq!(merged.len(), 5);
    for d in ["2024-01-01", "2024-01-02", "2024-01-04", "2024-01-05"] {
      assert_eq!(merged[&date(d)], original[&date(d)]);
    }
    let keys: Vec<_> = merged[&date("2024-01-03")]
      .iter()
      .map(|e| e.key.as_str())
      .collect();
    assert_eq!(keys, vec!["NEW-1", "NEW-2"]);
  }

  #[test]
  fn test_months_in_year_sorted_and_filtered() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path());
    for month in [11, 2, 7] {
      storage
        .store_month(MonthKey { year: 2024, month }, &batch(&[]))
        .unwrap();
    }
    storage
      .store_month(MonthKey { year: 2023, month: 5 }, &batch(&[]))
      .unwrap();
    fs::create_dir_all(dir.path().join("2024/scratch")).unwrap();

    let months: Vec<u32> = storage
      .months_in_year(2024)
      .unwrap()
      .into_iter()
      .map(|k| k.month)
      .collect();
    assert_eq!(months, vec![2, 7, 11]);
    assert!(storage.months_in_year(1999).unwrap().is_empty());
  }

  #[test]
  fn test_months_in_year_skips_capitalized_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path());
    let stray = dir.path().join("2024/January");
    fs::create_dir_all(&stray).unwrap();
    fs::write(stray.join(BATCH_FILE), "{}").unwrap();

    assert!(storage.months_in_year(2024).unwrap().is_empty());
  }

  #[test]
  fn test_malformed_batch_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonFileStorage::new(dir.path());
    let path = dir.path().join("2024/march");
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join(BATCH_FILE), "{not json").unwrap();

    let err = storage
      .load_month::<Entry>(MonthKey { year: 2024, month: 3 })
      .unwrap_err();
    assert!(err.to_string().contains("march"));
  }
}

//! Cache layer that decides which dates are served locally and which are fetched.

use chrono::{Days, NaiveDate};
use color_eyre::Result;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::storage::CacheStorage;
use super::traits::{CacheResult, Cacheable, MonthBatch, MonthKey};
use crate::timeframe::DateWindow;

/// Outcome of looking up a set of dates in the cache.
#[derive(Debug, Clone)]
pub struct CacheLookup<T> {
  /// Dates found in a stored month batch, with their records
  pub hits: BTreeMap<NaiveDate, Vec<T>>,
  /// Dates that must be fetched
  pub missing: BTreeSet<NaiveDate>,
}

/// Fetched records grouped by the calendar date of their partition timestamp.
#[derive(Debug, Clone)]
pub struct Bucketed<T> {
  pub by_date: BTreeMap<NaiveDate, Vec<T>>,
  /// Records without a usable partition timestamp
  pub undated: Vec<T>,
}

/// How a single request should use the cache.
#[derive(Debug, Clone, Copy)]
pub struct FetchPlan<'a> {
  pub window: DateWindow,
  /// Timestamp field records are partitioned on
  pub field: &'a str,
  /// Read and write the cache; when false every date goes to the network
  pub use_cache: bool,
  /// Dates from this one onwards are incomplete and never persisted
  pub today: NaiveDate,
}

/// Date-partitioned cache in front of a remote fetcher.
pub struct IssueCache<S: CacheStorage> {
  storage: Arc<S>,
}

impl<S: CacheStorage> IssueCache<S> {
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
    }
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Split `dates` into those present in stored month batches and those that are not.
  pub fn lookup<T: Cacheable>(&self, dates: &BTreeSet<NaiveDate>) -> Result<CacheLookup<T>> {
    let mut hits = BTreeMap::new();
    let mut missing = BTreeSet::new();

    let mut by_month: BTreeMap<MonthKey, Vec<NaiveDate>> = BTreeMap::new();
    for date in dates {
      by_month.entry(MonthKey::of(*date)).or_default().push(*date);
    }

    for (month, month_dates) in by_month {
      let mut batch = self.storage.load_month::<T>(month)?.unwrap_or_default();
      for date in month_dates {
        match batch.remove(&date) {
          Some(records) => {
            hits.insert(date, records);
          }
          None => {
            missing.insert(date);
          }
        }
      }
    }

    Ok(CacheLookup { hits, missing })
  }

  /// Merge freshly fetched date entries into their month batches.
  pub fn store<T: Cacheable>(&self, fresh: BTreeMap<NaiveDate, Vec<T>>) -> Result<()> {
    let mut by_month: BTreeMap<MonthKey, MonthBatch<T>> = BTreeMap::new();
    for (date, records) in fresh {
      by_month
        .entry(MonthKey::of(date))
        .or_default()
        .insert(date, records);
    }

    for (month, batch) in by_month {
      self.storage.merge_month(month, batch)?;
    }
    Ok(())
  }

  /// Resolve a request against the cache, fetching whatever is missing.
  ///
  /// The fetcher receives the `[start, end)` bounds to query, or `None` for
  /// an unbounded query. Only one remote query is issued: it spans from the
  /// first to the last missing date.
  pub async fn fetch_window<T, F, Fut>(
    &self,
    plan: FetchPlan<'_>,
    fetcher: F,
  ) -> Result<CacheResult<Vec<T>>>
  where
    T: Cacheable,
    F: FnOnce(Option<(NaiveDate, NaiveDate)>) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let (start, end) = match plan.window {
      DateWindow::Unbounded => {
        debug!("unbounded window, skipping cache");
        return Ok(CacheResult::from_network(fetcher(None).await?));
      }
      DateWindow::Bounded { start, end } => (start, end),
    };

    if !plan.use_cache {
      debug!(%start, %end, "cache bypassed");
      return Ok(CacheResult::from_network(fetcher(Some((start, end))).await?));
    }

    let dates: BTreeSet<NaiveDate> = plan.window.days().into_iter().collect();
    let lookup = self.lookup::<T>(&dates)?;

    let (first_missing, last_missing) = match (lookup.missing.first(), lookup.missing.last()) {
      (Some(first), Some(last)) => (*first, *last),
      _ => {
        info!(days = dates.len(), "all dates served from cache");
        let data = lookup.hits.into_values().flatten().collect();
        return Ok(CacheResult::from_cache(data));
      }
    };

    let span = (first_missing, last_missing + Days::new(1));
    info!(
      cached = lookup.hits.len(),
      missing = lookup.missing.len(),
      from = %span.0,
      to = %span.1,
      "fetching dates missing from cache"
    );

    let fetched = fetcher(Some(span)).await?;
    let Bucketed {
      mut by_date,
      undated,
    } = bucket_by_date(fetched, plan.field);

    if !undated.is_empty() {
      warn!(
        count = undated.len(),
        field = plan.field,
        "records without a partition timestamp were not cached"
      );
    }

    // Every completed day of the span is now known, including empty ones.
    let span_days: Vec<NaiveDate> = span.0.iter_days().take_while(|d| *d < span.1).collect();
    let persist: BTreeMap<NaiveDate, Vec<T>> = span_days
      .iter()
      .filter(|d| **d < plan.today)
      .map(|d| (*d, by_date.get(d).cloned().unwrap_or_default()))
      .collect();
    self.store(persist)?;

    let mut hits = lookup.hits;
    let mut data = Vec::new();
    for date in &dates {
      if *date >= span.0 && *date < span.1 {
        data.extend(by_date.remove(date).unwrap_or_default());
      } else if let Some(records) = hits.remove(date) {
        data.extend(records);
      }
    }

    // Dated outside the fetched span, e.g. when the server filters in another
    // timezone than the timestamps carry. Returned, never persisted.
    let returned: HashSet<String> = data.iter().map(|r| r.cache_key()).collect();
    let stray: Vec<T> = by_date
      .into_values()
      .flatten()
      .filter(|r| !returned.contains(&r.cache_key()))
      .collect();
    if !stray.is_empty() {
      warn!(
        count = stray.len(),
        field = plan.field,
        "records dated outside the fetched span were not cached"
      );
    }
    data.extend(stray);
    data.extend(undated);

    if lookup.missing.len() == dates.len() {
      Ok(CacheResult::from_network(data))
    } else {
      Ok(CacheResult::merged(data))
    }
  }
}

impl<S: CacheStorage> Clone for IssueCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

/// Group records by the date of their `field` timestamp, dropping repeated keys.
pub fn bucket_by_date<T: Cacheable>(records: Vec<T>, field: &str) -> Bucketed<T> {
  let mut seen = HashSet::new();
  let mut by_date: BTreeMap<NaiveDate, Vec<T>> = BTreeMap::new();
  let mut undated = Vec::new();

  for record in records {
    if !seen.insert(record.cache_key()) {
      continue;
    }
    match record.partition_date(field) {
      Some(date) => by_date.entry(date).or_default().push(record),
      None => undated.push(record),
    }
  }

  Bucketed { by_date, undated }
}

//! Cached Jira client that wraps JiraClient with the date-partitioned cache.

use chrono::NaiveDate;
use color_eyre::Result;
use std::path::Path;
use tracing::{debug, info};

use crate::cache::{CacheResult, FetchPlan, IssueCache, JsonFileStorage};
use crate::config::Connection;

use super::api_types::Issue;
use super::client::JiraClient;
use super::fields::FieldCatalog;
use super::jql::IssueQuery;
use super::types::{BoardConfiguration, ProjectDetails};

/// Jira client with transparent caching of project issues.
///
/// Only issue searches go through the cache; metadata calls are small and
/// always hit the network.
#[derive(Clone)]
pub struct CachedJiraClient {
  inner: JiraClient,
  cache: IssueCache<JsonFileStorage>,
}

impl CachedJiraClient {
  pub fn new(conn: &Connection, storage: JsonFileStorage) -> Result<Self> {
    let inner = JiraClient::new(conn)?;
    Ok(Self {
      inner,
      cache: IssueCache::new(storage),
    })
  }

  /// Directory holding this client's month batches.
  pub fn cache_dir(&self) -> &Path {
    self.cache.storage().root()
  }

  /// Fetch the issues matching `query`, serving completed days from cache.
  ///
  /// The cache is consulted only when [`IssueQuery::uses_cache`] allows it.
  pub async fn get_project_issues(
    &self,
    query: &IssueQuery,
    today: NaiveDate,
  ) -> Result<CacheResult<Vec<Issue>>> {
    let plan = FetchPlan {
      window: query.timeframe.resolve(today),
      field: query.field.as_str(),
      use_cache: query.uses_cache(),
      today,
    };
    let (from, to) = plan.window.bounds();
    debug!(?from, ?to, use_cache = plan.use_cache, "resolved timeframe");

    let result = self
      .cache
      .fetch_window(plan, |bounds| {
        let inner = self.inner.clone();
        let jql = query.to_jql(bounds);
        async move { inner.search_issues(&jql).await }
      })
      .await?;

    info!(
      project = %query.project,
      timeframe = %query.timeframe,
      issues = result.data.len(),
      source = %result.source,
      "fetched project issues"
    );
    Ok(result)
  }

  /// Get project details (not cached).
  pub async fn get_project_details(&self, project: &str) -> Result<ProjectDetails> {
    self.inner.get_project_details(project).await
  }

  /// Get board configuration (not cached - changes rarely and is small).
  pub async fn get_board_configuration(&self, project: &str) -> Result<BoardConfiguration> {
    self.inner.get_board_configuration(project).await
  }

  /// Fetch the custom field definitions (not cached here; see `FieldCatalog::save`).
  pub async fn get_custom_fields(&self) -> Result<FieldCatalog> {
    self.inner.get_custom_fields().await
  }
}

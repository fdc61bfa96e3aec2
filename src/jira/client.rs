use crate::config::{AuthType, Connection};
use crate::jira::api_types::{
  ApiBoardConfigResponse, ApiField, ApiProject, ApiSearchRequest, ApiSearchResponse, Issue,
};
use crate::jira::fields::{FieldCatalog, FieldInfo};
use crate::jira::types::{BoardConfiguration, ProjectDetails};
use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use tracing::{debug, info};

/// Page size requested from the search endpoint.
pub const SEARCH_PAGE_SIZE: u64 = 100;

/// Jira API client wrapper
#[derive(Clone)]
pub struct JiraClient {
  client: gouqi::r#async::Jira,
}

impl JiraClient {
  pub fn new(conn: &Connection) -> Result<Self> {
    let credentials = match conn.auth_type {
      AuthType::Onpremise => gouqi::Credentials::Bearer(conn.token.clone()),
      AuthType::Cloud | AuthType::Auto => {
        gouqi::Credentials::Basic(conn.email.clone(), conn.token.clone())
      }
    };

    let client = gouqi::r#async::Jira::new(&conn.url, credentials)
      .map_err(|e| eyre!("Failed to create Jira client: {}", e))?;

    Ok(Self { client })
  }

  /// Search for issues using JQL, following pages until a short page.
  ///
  /// All fields and the changelog are requested for every issue.
  pub async fn search_issues(&self, jql: &str) -> Result<Vec<Issue>> {
    info!(jql, "executing search");

    let issues = collect_pages(SEARCH_PAGE_SIZE, |start_at| async move {
      let request = ApiSearchRequest {
        jql,
        start_at,
        max_results: SEARCH_PAGE_SIZE,
        fields: vec!["*all"],
        expand: vec!["changelog"],
      };

      // The error display of a Jira fault carries the response's error body
      let response: ApiSearchResponse = self
        .client
        .post("api", "/search", &request)
        .await
        .map_err(|e| eyre!("Failed to search issues (startAt={}): {}", start_at, e))?;

      debug!(start_at, returned = response.issues.len(), total = ?response.total, "search page");
      Ok(response.issues)
    })
    .await?;

    Ok(issues)
  }

  /// Get project details by key
  pub async fn get_project_details(&self, project: &str) -> Result<ProjectDetails> {
    let endpoint = format!("/project/{}", project);

    let response: ApiProject = self
      .client
      .get("api", &endpoint)
      .await
      .map_err(|e| eyre!("Failed to get project {}: {}", project, e))?;

    Ok(response.into())
  }

  /// Get the column configuration of the project's first board.
  ///
  /// Projects without any board get an empty configuration.
  pub async fn get_board_configuration(&self, project: &str) -> Result<BoardConfiguration> {
    use futures::StreamExt;

    let boards_api = self.client.boards();
    let options = gouqi::SearchOptions::builder()
      .project_key_or_id(project)
      .build();

    let stream = boards_api
      .stream(&options)
      .await
      .map_err(|e| eyre!("Failed to get boards: {}", e))?;
    futures::pin_mut!(stream);

    let board = match stream.next().await {
      Some(board) => board.map_err(|e| eyre!("Failed to get boards: {}", e))?,
      None => {
        info!(project, "project has no boards");
        return Ok(BoardConfiguration::default());
      }
    };

    let endpoint = format!("/board/{}/configuration", board.id);

    let response: ApiBoardConfigResponse = self
      .client
      .get("agile", &endpoint)
      .await
      .map_err(|e| eyre!("Failed to get board configuration: {}", e))?;

    Ok(response.into())
  }

  /// Get the catalog of custom fields defined on the instance
  pub async fn get_custom_fields(&self) -> Result<FieldCatalog> {
    let fields: Vec<ApiField> = self
      .client
      .get("api", "/field")
      .await
      .map_err(|e| eyre!("Failed to get field definitions: {}", e))?;

    Ok(
      fields
        .into_iter()
        .filter(|f| f.custom)
        .map(|f| {
          (
            f.id,
            FieldInfo {
              name: f.name,
              description: f.description,
              field_type: f.schema.and_then(|s| s.field_type),
            },
          )
        })
        .collect(),
    )
  }
}

/// Collect every record behind an offset-paged endpoint.
///
/// The offset advances by the number of records each page returns; paging
/// stops at the first page shorter than `page_size`. Any error aborts the
/// whole collection.
pub async fn collect_pages<T, F, Fut>(page_size: u64, mut fetch_page: F) -> Result<Vec<T>>
where
  F: FnMut(u64) -> Fut,
  Fut: Future<Output = Result<Vec<T>>>,
{
  let mut all = Vec::new();
  let mut start_at = 0u64;

  loop {
    let page = fetch_page(start_at).await?;
    let count = page.len() as u64;
    all.extend(page);

    if count == 0 || count < page_size {
      break;
    }
    start_at += count;
  }

  Ok(all)
}

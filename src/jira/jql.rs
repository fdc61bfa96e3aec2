//! Issue queries and their JQL rendering.

use chrono::NaiveDate;

use super::types::DateField;
use crate::timeframe::Timeframe;

/// Everything needed to fetch one set of project issues.
#[derive(Debug, Clone)]
pub struct IssueQuery {
  pub project: String,
  pub field: DateField,
  pub timeframe: Timeframe,
  pub assignees: Vec<String>,
  pub excluded_statuses: Vec<String>,
  /// Ignore cached dates and do not write results back
  pub bypass_cache: bool,
}

impl IssueQuery {
  pub fn new(project: impl Into<String>, field: DateField, timeframe: Timeframe) -> Self {
    Self {
      project: project.into(),
      field,
      timeframe,
      assignees: Vec::new(),
      excluded_statuses: Vec::new(),
      bypass_cache: false,
    }
  }

  /// Whether the query narrows results beyond project and date.
  ///
  /// Filtered results are incomplete for their dates and must not be cached.
  pub fn is_filtered(&self) -> bool {
    !self.assignees.is_empty() || !self.excluded_statuses.is_empty()
  }

  /// Whether results may be served from and written to the date cache.
  ///
  /// Only unfiltered `created` queries that are not bypassed qualify.
  pub fn uses_cache(&self) -> bool {
    !self.bypass_cache && self.field.is_cacheable() && !self.is_filtered()
  }

  /// Render JQL for the given `[start, end)` bounds, or no date filter.
  pub fn to_jql(&self, bounds: Option<(NaiveDate, NaiveDate)>) -> String {
    let field = self.field.as_str();
    let mut jql = format!("project = {}", quote(&self.project));

    if let Some((start, end)) = bounds {
      jql.push_str(&format!(
        " AND {field} >= '{}' AND {field} < '{}'",
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d"),
      ));
    }

    if !self.assignees.is_empty() {
      jql.push_str(&format!(" AND assignee IN ({})", quote_list(&self.assignees)));
    }

    if !self.excluded_statuses.is_empty() {
      jql.push_str(&format!(
        " AND status NOT IN ({})",
        quote_list(&self.excluded_statuses)
      ));
    }

    jql.push_str(&format!(" ORDER BY {} DESC", field));
    jql
  }
}

fn quote(value: &str) -> String {
  format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn quote_list(values: &[String]) -> String {
  values
    .iter()
    .map(|v| quote(v))
    .collect::<Vec<_>>()
    .join(", ")
}

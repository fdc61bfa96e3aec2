use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use super::api_types::{extract_text, Issue};

/// Timestamp field an issue query filters and partitions on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
  Created,
  Updated,
}

impl DateField {
  /// Field name as used in JQL and in the issue's `fields` object.
  pub fn as_str(&self) -> &'static str {
    match self {
      DateField::Created => "created",
      DateField::Updated => "updated",
    }
  }

  /// Whether results may be persisted in the date-partitioned cache.
  ///
  /// An issue's update date moves every time it is touched, so buckets keyed
  /// by it go stale immediately and would also collide with the created-date
  /// buckets sharing the same layout.
  pub fn is_cacheable(&self) -> bool {
    matches!(self, DateField::Created)
  }
}

impl fmt::Display for DateField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Project summary
#[derive(Debug, Clone)]
pub struct ProjectDetails {
  pub key: String,
  pub name: String,
  pub project_type: Option<String>,
  pub description: Option<String>,
  pub lead: Option<String>,
}

/// Status reference within a board column
#[derive(Debug, Clone)]
pub struct StatusInfo {
  pub name: String,
}

/// Board column configuration
#[derive(Debug, Clone)]
pub struct BoardColumn {
  pub name: String,
  pub statuses: Vec<StatusInfo>,
}

/// Board configuration with columns
#[derive(Debug, Clone, Default)]
pub struct BoardConfiguration {
  pub columns: Vec<BoardColumn>,
}

/// One status transition from the changelog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
  pub date: Option<String>,
  pub author: Option<String>,
  pub from: Option<String>,
  pub to: Option<String>,
}

impl StatusChange {
  pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
    self.date.as_deref().and_then(parse_jira_timestamp)
  }
}

/// One comment, with its body left as Jira returned it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentEntry {
  pub author: Option<String>,
  pub created: Option<String>,
  pub body: Option<Value>,
}

/// Parse Jira's `2024-01-03T10:15:30.123+0100` timestamps.
pub fn parse_jira_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
  DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")
    .or_else(|_| DateTime::parse_from_rfc3339(s))
    .ok()
}

impl Issue {
  pub fn summary(&self) -> &str {
    self.fields.summary.as_deref().unwrap_or_default()
  }

  pub fn status_name(&self) -> Option<&str> {
    self.fields.status.as_ref().map(|s| s.name.as_str())
  }

  pub fn issue_type_name(&self) -> Option<&str> {
    self.fields.issue_type.as_ref().map(|t| t.name.as_str())
  }

  pub fn priority_name(&self) -> Option<&str> {
    self.fields.priority.as_ref().map(|p| p.name.as_str())
  }

  pub fn assignee_name(&self) -> Option<&str> {
    self
      .fields
      .assignee
      .as_ref()
      .and_then(|u| u.display_name.as_deref())
  }

  pub fn reporter_name(&self) -> Option<&str> {
    self
      .fields
      .reporter
      .as_ref()
      .and_then(|u| u.display_name.as_deref())
  }

  pub fn fix_version_names(&self) -> Vec<&str> {
    self
      .fields
      .fix_versions
      .iter()
      .map(|v| v.name.as_str())
      .collect()
  }

  /// `KEY - summary` of the parent, skipping whichever part is missing.
  pub fn parent_label(&self) -> String {
    let Some(parent) = &self.fields.parent else {
      return String::new();
    };
    let summary = parent.fields.as_ref().and_then(|f| f.summary.as_deref());
    [parent.key.as_deref(), summary]
      .into_iter()
      .flatten()
      .filter(|s| !s.is_empty())
      .collect::<Vec<_>>()
      .join(" - ")
  }

  pub fn comments(&self) -> Vec<CommentEntry> {
    self
      .fields
      .comment
      .iter()
      .flat_map(|page| page.comments.iter())
      .map(|c| CommentEntry {
        author: c.author.as_ref().and_then(|a| a.display_name.clone()),
        created: c.created.clone(),
        body: c.body.clone(),
      })
      .collect()
  }

  /// Latest comment as `(author, plain text)`.
  pub fn latest_comment(&self) -> Option<(Option<&str>, String)> {
    let comment = self.fields.comment.as_ref()?.comments.last()?;
    let author = comment.author.as_ref().and_then(|a| a.display_name.as_deref());
    let text = comment.body.as_ref().and_then(extract_text).unwrap_or_default();
    Some((author, text))
  }

  /// Status transitions in changelog order.
  pub fn status_changes(&self) -> Vec<StatusChange> {
    let Some(changelog) = &self.changelog else {
      return Vec::new();
    };
    changelog
      .histories
      .iter()
      .flat_map(|history| {
        history
          .items
          .iter()
          .filter(|item| item.field.as_deref() == Some("status"))
          .map(move |item| StatusChange {
            date: history.created.clone(),
            author: history.author.as_ref().and_then(|a| a.display_name.clone()),
            from: item.from_label.clone(),
            to: item.to_label.clone(),
          })
      })
      .collect()
  }

  /// Number of transitions into `status`.
  pub fn transitions_to(&self, status: &str) -> usize {
    self
      .status_changes()
      .iter()
      .filter(|c| c.to.as_deref() == Some(status))
      .count()
  }

  /// Earliest transition into any of `statuses`.
  ///
  /// Transitions without a parseable timestamp are ignored.
  pub fn first_status_change_to(&self, statuses: &[String]) -> Option<StatusChange> {
    self
      .status_changes()
      .into_iter()
      .filter(|c| {
        c.to
          .as_deref()
          .is_some_and(|to| statuses.iter().any(|s| s.eq_ignore_ascii_case(to)))
      })
      .filter_map(|c| c.timestamp().map(|ts| (ts, c)))
      .min_by_key(|(ts, _)| *ts)
      .map(|(_, c)| c)
  }

  /// Days between creation and the first transition into `statuses`.
  pub fn resolution_days(&self, statuses: &[String]) -> Option<f64> {
    let created = self.fields.created.as_deref().and_then(parse_jira_timestamp)?;
    let done = self.first_status_change_to(statuses)?.timestamp()?;
    Some((done - created).num_seconds() as f64 / 86_400.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn issue(value: Value) -> Issue {
    serde_json::from_value(value).unwrap()
  }

  fn with_history() -> Issue {
    issue(json!({
      "key": "PROJ-7",
      "fields": {
        "created": "2024-01-01T09:00:00.000+0000",
        "parent": { "key": "PROJ-1", "fields": { "summary": "Epic" } }
      },
      "changelog": { "histories": [
        { "created": "2024-01-05T09:00:00.000+0000", "author": { "displayName": "Bo" },
          "items": [{ "field": "status", "fromString": "In Review", "toString": "Done" }] },
        { "created": "2024-01-03T09:00:00.000+0000",
          "items": [
            { "field": "assignee", "toString": "Bo" },
            { "field": "status", "fromString": "Done", "toString": "To Do" }
          ] },
        { "created": "2024-01-02T21:00:00.000+0000",
          "items": [{ "field": "status", "fromString": "To Do", "toString": "Done" }] },
        { "created": "garbage",
          "items": [{ "field": "status", "fromString": "To Do", "toString": "Done" }] }
      ]}
    }))
  }

  #[test]
  fn test_status_changes_skip_other_fields() {
    let changes = with_history().status_changes();
    assert_eq!(changes.len(), 4);
    assert_eq!(changes[0].author.as_deref(), Some("Bo"));
    assert_eq!(with_history().transitions_to("To Do"), 1);
  }

  #[test]
  fn test_first_completion_is_earliest_by_time() {
    let done = vec!["done".to_string()];
    let first = with_history().first_status_change_to(&done).unwrap();
    assert_eq!(first.date.as_deref(), Some("2024-01-02T21:00:00.000+0000"));
    assert_eq!(with_history().resolution_days(&done), Some(1.5));
  }

  #[test]
  fn test_completion_missing_without_changelog() {
    let plain = issue(json!({ "key": "PROJ-8", "fields": {} }));
    assert!(plain
      .first_status_change_to(&["Done".to_string()])
      .is_none());
    assert!(plain.resolution_days(&["Done".to_string()]).is_none());
  }

  #[test]
  fn test_parent_label() {
    assert_eq!(with_history().parent_label(), "PROJ-1 - Epic");
    let keyless = issue(json!({ "key": "X-1", "fields": { "parent": { "fields": { "summary": "S" } } } }));
    assert_eq!(keyless.parent_label(), "S");
    let orphan = issue(json!({ "key": "X-2", "fields": {} }));
    assert_eq!(orphan.parent_label(), "");
  }

  #[test]
  fn test_date_field_cacheability() {
    assert!(DateField::Created.is_cacheable());
    assert!(!DateField::Updated.is_cacheable());
  }
}

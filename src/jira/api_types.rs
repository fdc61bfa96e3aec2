//! Serde types matching Jira API responses.
//!
//! Issues are stored in the cache exactly as these types serialize, so every
//! nested object keeps the keys it does not model in a flattened `extra` map.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Keys of an API object that have no typed field.
pub type Extra = BTreeMap<String, Value>;

/// Treat a JSON `null` list as empty.
fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Common nested field types
// ============================================================================

/// Any object identified by a display name (status, priority, issue type, version).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Named {
  #[serde(default)]
  pub name: String,
  #[serde(flatten)]
  pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
  #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
  #[serde(flatten)]
  pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParentFields {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub summary: Option<String>,
  #[serde(flatten)]
  pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParentRef {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub key: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fields: Option<ParentFields>,
  #[serde(flatten)]
  pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub author: Option<User>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created: Option<String>,
  /// Plain text (API v2) or an ADF document (API v3)
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub body: Option<Value>,
  #[serde(flatten)]
  pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentPage {
  #[serde(default, deserialize_with = "nullable_vec")]
  pub comments: Vec<Comment>,
  #[serde(flatten)]
  pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkedIssue {
  #[serde(default)]
  pub key: String,
  #[serde(flatten)]
  pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueLink {
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub link_type: Option<Named>,
  #[serde(rename = "inwardIssue", default, skip_serializing_if = "Option::is_none")]
  pub inward_issue: Option<LinkedIssue>,
  #[serde(rename = "outwardIssue", default, skip_serializing_if = "Option::is_none")]
  pub outward_issue: Option<LinkedIssue>,
  #[serde(flatten)]
  pub extra: Extra,
}

// ============================================================================
// Changelog (requested with expand=changelog)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeItem {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
  #[serde(rename = "fromString", default, skip_serializing_if = "Option::is_none")]
  pub from_label: Option<String>,
  #[serde(rename = "toString", default, skip_serializing_if = "Option::is_none")]
  pub to_label: Option<String>,
  #[serde(flatten)]
  pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub author: Option<User>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created: Option<String>,
  #[serde(default, deserialize_with = "nullable_vec")]
  pub items: Vec<ChangeItem>,
  #[serde(flatten)]
  pub extra: Extra,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Changelog {
  #[serde(default, deserialize_with = "nullable_vec")]
  pub histories: Vec<History>,
  #[serde(flatten)]
  pub extra: Extra,
}

// ============================================================================
// Issues
// ============================================================================

/// Issue fields with a typed core; everything else lands in `extensions`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueFields {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub summary: Option<String>,
  #[serde(rename = "issuetype", default, skip_serializing_if = "Option::is_none")]
  pub issue_type: Option<Named>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<Named>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub priority: Option<Named>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reporter: Option<User>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assignee: Option<User>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated: Option<String>,
  #[serde(rename = "fixVersions", default, deserialize_with = "nullable_vec")]
  pub fix_versions: Vec<Named>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent: Option<ParentRef>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub comment: Option<CommentPage>,
  #[serde(rename = "issuelinks", default, deserialize_with = "nullable_vec")]
  pub issue_links: Vec<IssueLink>,
  /// Custom fields and any other field without a typed slot, by field id
  #[serde(flatten)]
  pub extensions: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub key: String,
  #[serde(default)]
  pub fields: IssueFields,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub changelog: Option<Changelog>,
  #[serde(flatten)]
  pub extra: Extra,
}

// ============================================================================
// Search endpoint
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiSearchRequest<'a> {
  pub jql: &'a str,
  #[serde(rename = "startAt")]
  pub start_at: u64,
  #[serde(rename = "maxResults")]
  pub max_results: u64,
  pub fields: Vec<&'static str>,
  pub expand: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSearchResponse {
  #[serde(default, deserialize_with = "nullable_vec")]
  pub issues: Vec<Issue>,
  #[serde(default)]
  pub total: Option<u64>,
}

// ============================================================================
// Project, board and field metadata
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiProject {
  pub key: String,
  #[serde(default)]
  pub name: String,
  #[serde(rename = "projectTypeKey", default)]
  pub project_type_key: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub lead: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct ApiStatusRef {
  pub id: String,
  #[serde(default)]
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiColumn {
  pub name: String,
  #[serde(default)]
  pub statuses: Vec<ApiStatusRef>,
}

#[derive(Debug, Deserialize)]
pub struct ApiColumnConfig {
  #[serde(default)]
  pub columns: Vec<ApiColumn>,
}

#[derive(Debug, Deserialize)]
pub struct ApiBoardConfigResponse {
  #[serde(rename = "columnConfig")]
  pub column_config: Option<ApiColumnConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ApiFieldSchema {
  #[serde(rename = "type")]
  pub field_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiField {
  pub id: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub custom: bool,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub schema: Option<ApiFieldSchema>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

use super::types::{BoardColumn, BoardConfiguration, ProjectDetails, StatusInfo};

impl From<ApiColumn> for BoardColumn {
  fn from(col: ApiColumn) -> Self {
    BoardColumn {
      name: col.name,
      statuses: col
        .statuses
        .into_iter()
        .map(|s| StatusInfo {
          name: if s.name.is_empty() { s.id } else { s.name },
        })
        .collect(),
    }
  }
}

impl From<ApiBoardConfigResponse> for BoardConfiguration {
  fn from(resp: ApiBoardConfigResponse) -> Self {
    BoardConfiguration {
      columns: resp
        .column_config
        .map(|cc| cc.columns.into_iter().map(BoardColumn::from).collect())
        .unwrap_or_default(),
    }
  }
}

impl From<ApiProject> for ProjectDetails {
  fn from(p: ApiProject) -> Self {
    ProjectDetails {
      key: p.key,
      name: p.name,
      project_type: p.project_type_key,
      description: p.description.filter(|d| !d.is_empty()),
      lead: p.lead.and_then(|u| u.display_name),
    }
  }
}

// ============================================================================
// Helpers
// ============================================================================

/// Extract plain text from Jira's ADF or plain text format.
///
/// Paragraph-level nodes end with a newline; trailing whitespace is trimmed.
pub fn extract_text(value: &Value) -> Option<String> {
  // If it's a string, return it directly (API v2)
  if let Some(s) = value.as_str() {
    return Some(s.to_string());
  }

  // If it's an ADF document (API v3), extract text content
  if let Some(content) = value.get("content").and_then(|v| v.as_array()) {
    let mut text = String::new();
    extract_adf_text(content, &mut text);
    let text = text.trim_end();
    if !text.is_empty() {
      return Some(text.to_string());
    }
  }

  None
}

/// Recursively extract text from ADF content
fn extract_adf_text(content: &[Value], output: &mut String) {
  for node in content {
    if let Some(node_type) = node.get("type").and_then(|v| v.as_str()) {
      match node_type {
        "text" => {
          if let Some(text) = node.get("text").and_then(|v| v.as_str()) {
            output.push_str(text);
          }
        }
        "hardBreak" => {
          output.push('\n');
        }
        _ => {
          if let Some(children) = node.get("content").and_then(|v| v.as_array()) {
            extract_adf_text(children, output);
          }
          if node_type == "paragraph" || node_type == "heading" {
            output.push('\n');
          }
        }
      }
    }
  }
}

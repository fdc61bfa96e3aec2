//! Custom field catalog and per-type value formatting.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use super::api_types::{extract_text, Issue};
use super::development::format_development;

/// Definition of one custom field as stored in the catalog file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
  pub name: Option<String>,
  pub description: Option<String>,
  #[serde(rename = "type")]
  pub field_type: Option<String>,
}

/// Custom field definitions keyed by field id (`customfield_10020`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldCatalog(BTreeMap<String, FieldInfo>);

impl FromIterator<(String, FieldInfo)> for FieldCatalog {
  fn from_iter<I: IntoIterator<Item = (String, FieldInfo)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl FieldCatalog {
  /// Load the catalog, falling back to an empty one when the file is missing.
  pub fn load(path: &Path) -> Result<Self> {
    if !path.exists() {
      warn!(path = %path.display(), "custom field mappings file not found");
      return Ok(Self::default());
    }

    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read field catalog {}: {}", path.display(), e))?;
    serde_json::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse field catalog {}: {}", path.display(), e))
  }

  pub fn save(&self, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create {}: {}", parent.display(), e))?;
    }
    let data = serde_json::to_string_pretty(self)?;
    std::fs::write(path, data)
      .map_err(|e| eyre!("Failed to write field catalog {}: {}", path.display(), e))?;
    info!(path = %path.display(), fields = self.0.len(), "saved custom field catalog");
    Ok(())
  }

  pub fn get(&self, id: &str) -> Option<&FieldInfo> {
    self.0.get(id)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Display name for a field id, the id itself when unnamed.
  pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
    self
      .get(id)
      .and_then(|f| f.name.as_deref())
      .unwrap_or(id)
  }
}

/// Display names of the custom fields that get bespoke formatting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FieldRoles {
  pub sprint: String,
  pub development: String,
  pub resolution: String,
}

impl Default for FieldRoles {
  fn default() -> Self {
    Self {
      sprint: "Sprint".to_string(),
      development: "Development".to_string(),
      resolution: "Ticket Resolution Details".to_string(),
    }
  }
}

/// Custom field of an issue, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedField {
  pub id: String,
  pub name: String,
  pub value: String,
}

/// Format every catalogued, non-empty custom field of `issue`, ordered by field id.
///
/// Fields missing from the catalog, null, or empty lists are left out.
pub fn custom_fields(issue: &Issue, catalog: &FieldCatalog, roles: &FieldRoles) -> Vec<FormattedField> {
  issue
    .fields
    .extensions
    .iter()
    .filter(|(id, _)| id.starts_with("customfield_"))
    .filter(|(_, value)| !is_blank(value))
    .filter_map(|(id, value)| {
      let info = catalog.get(id)?;
      let name = catalog.display_name(id).to_string();
      let value = format_value(value, &name, info.field_type.as_deref(), roles);
      Some(FormattedField {
        id: id.clone(),
        name,
        value,
      })
    })
    .collect()
}

fn is_blank(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::Array(items) => items.is_empty(),
    _ => false,
  }
}

/// Format a custom field value by its name and schema type.
pub fn format_value(value: &Value, name: &str, field_type: Option<&str>, roles: &FieldRoles) -> String {
  if name == roles.sprint {
    return format_sprint(value);
  }
  if name == roles.development {
    return match value {
      Value::String(raw) => format_development(raw),
      Value::Null => format_development(""),
      other => other.to_string(),
    };
  }
  if name == roles.resolution {
    return format_resolution(value);
  }

  match (field_type, value) {
    (Some("array"), Value::Array(items)) => items.iter().map(plain).collect::<Vec<_>>().join(", "),
    (Some("user"), Value::Object(obj)) => obj
      .get("displayName")
      .and_then(Value::as_str)
      .map(String::from)
      .unwrap_or_else(|| value.to_string()),
    (Some("option"), Value::Object(obj)) => obj
      .get("value")
      .and_then(Value::as_str)
      .map(String::from)
      .unwrap_or_else(|| value.to_string()),
    _ => plain(value),
  }
}

/// Strings as-is, everything else as compact JSON.
fn plain(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// `name (state)` of the first sprint.
fn format_sprint(value: &Value) -> String {
  let first = match value {
    Value::Array(items) => items.first(),
    Value::Object(_) => Some(value),
    _ => None,
  };
  let Some(sprint) = first else {
    return "No sprint information".to_string();
  };
  let field = |key: &str| sprint.get(key).and_then(Value::as_str).unwrap_or("unknown");
  format!("{} ({})", field("name"), field("state"))
}

/// Text nodes of a rich-text document, one per line.
fn format_resolution(value: &Value) -> String {
  let paragraphs = match value.get("content").and_then(Value::as_array) {
    Some(paragraphs) => paragraphs,
    None => {
      return match value {
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => "No resolution information".to_string(),
      }
    }
  };

  paragraphs
    .iter()
    .filter_map(|p| p.get("content").and_then(Value::as_array))
    .flatten()
    .filter(|node| node.get("type").and_then(Value::as_str) == Some("text"))
    .map(|node| node.get("text").and_then(Value::as_str).unwrap_or_default())
    .collect::<Vec<_>>()
    .join("\n")
}

/// Plain text of an ADF or string comment body.
pub fn comment_text(body: Option<&Value>) -> String {
  body.and_then(extract_text).unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn catalog() -> FieldCatalog {
    serde_json::from_value(json!({
      "customfield_1": { "name": "Sprint", "description": null, "type": "array" },
      "customfield_2": { "name": "Severity", "description": null, "type": "option" },
      "customfield_3": { "name": "Reviewer", "description": null, "type": "user" },
      "customfield_4": { "name": "Components", "description": null, "type": "array" },
      "customfield_5": { "name": "Ticket Resolution Details", "description": null, "type": "any" },
      "customfield_6": { "name": "Story Points", "description": null, "type": "number" }
    }))
    .unwrap()
  }

  fn issue(fields: Value) -> Issue {
    serde_json::from_value(json!({ "key": "PROJ-1", "fields": fields })).unwrap()
  }

  #[test]
  fn test_formats_by_type_and_name() {
    let issue = issue(json!({
      "customfield_1": [{ "name": "Sprint 9", "state": "closed" }, { "name": "Sprint 10", "state": "active" }],
      "customfield_2": { "value": "High", "id": "7" },
      "customfield_3": { "displayName": "Ada" },
      "customfield_4": ["api", 3],
      "customfield_5": { "type": "doc", "content": [
        { "type": "paragraph", "content": [{ "type": "text", "text": "Root cause" }, { "type": "text", "text": "Fixed" }] }
      ]},
      "customfield_6": 5.0
    }));

    let formatted: Vec<(String, String)> = custom_fields(&issue, &catalog(), &FieldRoles::default())
      .into_iter()
      .map(|f| (f.name, f.value))
      .collect();

    assert_eq!(
      formatted,
      vec![
        ("Sprint".to_string(), "Sprint 9 (closed)".to_string()),
        ("Severity".to_string(), "High".to_string()),
        ("Reviewer".to_string(), "Ada".to_string()),
        ("Components".to_string(), "api, 3".to_string()),
        ("Ticket Resolution Details".to_string(), "Root cause\nFixed".to_string()),
        ("Story Points".to_string(), "5.0".to_string()),
      ]
    );
  }

  #[test]
  fn test_unknown_null_and_empty_fields_are_omitted() {
    let issue = issue(json!({
      "customfield_1": [],
      "customfield_2": null,
      "customfield_99": "not in catalog",
      "labels": ["x"]
    }));
    assert!(custom_fields(&issue, &catalog(), &FieldRoles::default()).is_empty());
  }

  #[test]
  fn test_missing_catalog_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FieldCatalog::load(&dir.path().join("absent.json")).unwrap();
    assert!(catalog.is_empty());
  }

  #[test]
  fn test_catalog_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config/jira_custom_fields.json");
    catalog().save(&path).unwrap();
    let loaded = FieldCatalog::load(&path).unwrap();
    assert_eq!(loaded, catalog());
    assert_eq!(loaded.display_name("customfield_2"), "Severity");
    assert_eq!(loaded.display_name("customfield_404"), "customfield_404");
  }

  #[test]
  fn test_custom_role_names() {
    let roles = FieldRoles {
      sprint: "Iteration".to_string(),
      ..FieldRoles::default()
    };
    let value = json!([{ "name": "It 3", "state": "active" }]);
    assert_eq!(format_value(&value, "Iteration", Some("array"), &roles), "It 3 (active)");
    assert_eq!(format_value(&value, "Sprint", Some("array"), &roles), r#"{"name":"It 3","state":"active"}"#);
  }
}

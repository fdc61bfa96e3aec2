//! Flatten a year of cached issues into one CSV table.

use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cache::CacheStorage;
use crate::jira::fields::{comment_text, custom_fields};
use crate::jira::{FieldCatalog, FieldRoles, Issue};

/// Columns every row starts with, in order.
pub const CORE_COLUMNS: [&str; 13] = [
  "Issue Key",
  "Issue Type",
  "Issue Summary",
  "Status",
  "Created",
  "Updated",
  "Priority",
  "Reporter",
  "Assignee",
  "Fix Version",
  "Parent Ticket",
  "Comments History",
  "Status Change History",
];

/// A custom field column. Field ids sharing a display name share a column.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExtensionColumn {
  name: String,
  ids: Vec<String>,
}

#[derive(Serialize)]
struct CommentCell<'a> {
  author: Option<&'a str>,
  created: Option<&'a str>,
  body: String,
}

/// Every cached issue of `year`: months in calendar order, dates ascending,
/// records in stored order.
pub fn load_year<S: CacheStorage>(storage: &S, year: i32) -> Result<Vec<Issue>> {
  let months = storage.months_in_year(year)?;
  if months.is_empty() {
    return Err(eyre!("No cached issues for {}. Run `issues` first.", year));
  }

  let mut issues = Vec::new();
  for month in months {
    let batch = storage.load_month::<Issue>(month)?.unwrap_or_default();
    issues.extend(batch.into_values().flatten());
  }
  Ok(issues)
}

/// Write the CSV for `year` to `writer`, returning the number of rows.
pub fn write_year<S: CacheStorage, W: Write>(
  storage: &S,
  year: i32,
  catalog: &FieldCatalog,
  roles: &FieldRoles,
  writer: W,
) -> Result<usize> {
  let issues = load_year(storage, year)?;
  write_issues(&issues, catalog, roles, writer)
}

/// Export `year` to `<out_dir>/issues_<year>.csv`, replacing any earlier export.
///
/// The table is written to a sibling tmp file first, so a failed export leaves
/// the previous file in place.
pub fn export_year<S: CacheStorage>(
  storage: &S,
  year: i32,
  catalog: &FieldCatalog,
  roles: &FieldRoles,
  out_dir: &Path,
) -> Result<PathBuf> {
  if catalog.is_empty() {
    warn!(year, "field catalog is empty, exporting core columns only");
  }

  std::fs::create_dir_all(out_dir)
    .map_err(|e| eyre!("Failed to create {}: {}", out_dir.display(), e))?;
  let path = out_dir.join(format!("issues_{}.csv", year));
  let tmp = path.with_extension("csv.tmp");
  let file =
    File::create(&tmp).map_err(|e| eyre!("Failed to create {}: {}", tmp.display(), e))?;

  let rows = match write_year(storage, year, catalog, roles, BufWriter::new(file)) {
    Ok(rows) => rows,
    Err(e) => {
      let _ = std::fs::remove_file(&tmp);
      return Err(e);
    }
  };
  std::fs::rename(&tmp, &path)
    .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;

  info!(year, rows, path = %path.display(), "exported issues");
  Ok(path)
}

fn write_issues<W: Write>(
  issues: &[Issue],
  catalog: &FieldCatalog,
  roles: &FieldRoles,
  writer: W,
) -> Result<usize> {
  let columns = extension_columns(issues, catalog);
  let mut wtr = csv::Writer::from_writer(writer);

  let header = CORE_COLUMNS
    .iter()
    .copied()
    .chain(columns.iter().map(|c| c.name.as_str()));
  wtr.write_record(header)?;

  for issue in issues {
    let mut row = core_row(issue)?;
    let values: BTreeMap<String, String> = custom_fields(issue, catalog, roles)
      .into_iter()
      .map(|f| (f.id, f.value))
      .collect();
    for column in &columns {
      let cell = column
        .ids
        .iter()
        .find_map(|id| values.get(id))
        .cloned()
        .unwrap_or_default();
      row.push(cell);
    }
    wtr.write_record(&row)?;
  }

  wtr.flush()?;
  Ok(issues.len())
}

/// Catalogued custom fields with a value in at least one issue, by field id.
fn extension_columns(issues: &[Issue], catalog: &FieldCatalog) -> Vec<ExtensionColumn> {
  let present: BTreeSet<&str> = issues
    .iter()
    .flat_map(|issue| issue.fields.extensions.iter())
    .filter(|(id, value)| {
      id.starts_with("customfield_") && catalog.get(id).is_some() && !is_blank(value)
    })
    .map(|(id, _)| id.as_str())
    .collect();

  let mut columns: Vec<ExtensionColumn> = Vec::new();
  let mut seen = HashSet::new();
  for id in present {
    let name = catalog.display_name(id);
    if seen.insert(name) {
      columns.push(ExtensionColumn {
        name: name.to_string(),
        ids: vec![id.to_string()],
      });
    } else if let Some(column) = columns.iter_mut().find(|c| c.name == name) {
      column.ids.push(id.to_string());
    }
  }
  columns
}

fn is_blank(value: &serde_json::Value) -> bool {
  value.is_null() || value.as_array().is_some_and(|a| a.is_empty())
}

fn core_row(issue: &Issue) -> Result<Vec<String>> {
  let comments: Vec<CommentCell> = issue
    .fields
    .comment
    .iter()
    .flat_map(|page| page.comments.iter())
    .map(|c| CommentCell {
      author: c.author.as_ref().and_then(|a| a.display_name.as_deref()),
      created: c.created.as_deref(),
      body: comment_text(c.body.as_ref()),
    })
    .collect();

  let comments = serde_json::to_string(&comments)
    .map_err(|e| eyre!("Failed to encode comments of {}: {}", issue.key, e))?;
  let changes = serde_json::to_string(&issue.status_changes())
    .map_err(|e| eyre!("Failed to encode status changes of {}: {}", issue.key, e))?;

  let text = |v: Option<&str>| v.unwrap_or_default().to_string();
  Ok(vec![
    issue.key.clone(),
    text(issue.issue_type_name()),
    issue.summary().to_string(),
    text(issue.status_name()),
    text(issue.fields.created.as_deref()),
    text(issue.fields.updated.as_deref()),
    text(issue.priority_name()),
    text(issue.reporter_name()),
    text(issue.assignee_name()),
    issue.fix_version_names().join(", "),
    issue.parent_label(),
    comments,
    changes,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{MemoryStorage, MonthBatch, MonthKey};
  use chrono::NaiveDate;
  use serde_json::{json, Value};

  fn issue(value: Value) -> Issue {
    serde_json::from_value(value).unwrap()
  }

  fn catalog() -> FieldCatalog {
    serde_json::from_value(json!({
      "customfield_10": { "name": "Team", "description": null, "type": "option" },
      "customfield_20": { "name": "Sprint", "description": null, "type": "array" },
      "customfield_30": { "name": "Team", "description": null, "type": "string" },
      "customfield_40": { "name": "Unused", "description": null, "type": "string" }
    }))
    .unwrap()
  }

  fn seeded() -> MemoryStorage {
    let storage = MemoryStorage::default();
    let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();

    let february: MonthBatch<Issue> = [(
      d("2024-02-01"),
      vec![issue(json!({
        "key": "PROJ-3",
        "fields": {
          "summary": "Later",
          "created": "2024-02-01T10:00:00.000+0000",
          "customfield_30": "Blue"
        }
      }))],
    )]
    .into_iter()
    .collect();

    let january: MonthBatch<Issue> = [
      (
        d("2024-01-09"),
        vec![issue(json!({
          "key": "PROJ-2",
          "fields": {
            "summary": "Second, with comma",
            "created": "2024-01-09T10:00:00.000+0000",
            "customfield_20": [{ "name": "S1", "state": "closed" }],
            "customfield_40": null
          }
        }))],
      ),
      (
        d("2024-01-02"),
        vec![issue(json!({
          "key": "PROJ-1",
          "fields": {
            "summary": "First",
            "issuetype": { "name": "Bug" },
            "status": { "name": "Done" },
            "created": "2024-01-02T10:00:00.000+0000",
            "fixVersions": [{ "name": "1.0" }, { "name": "1.1" }],
            "parent": { "key": "PROJ-0", "fields": { "summary": "Epic" } },
            "comment": { "comments": [{ "author": { "displayName": "Ada" }, "created": "2024-01-03", "body": "Looks good" }] },
            "customfield_10": { "value": "Red" }
          },
          "changelog": { "histories": [{ "created": "2024-01-04T10:00:00.000+0000",
            "items": [{ "field": "status", "fromString": "To Do", "toString": "Done" }] }] }
        }))],
      ),
    ]
    .into_iter()
    .collect();

    storage
      .store_month(MonthKey { year: 2024, month: 2 }, &february)
      .unwrap();
    storage
      .store_month(MonthKey { year: 2024, month: 1 }, &january)
      .unwrap();
    storage
  }

  fn export(storage: &MemoryStorage) -> String {
    let mut out = Vec::new();
    write_year(storage, 2024, &catalog(), &FieldRoles::default(), &mut out).unwrap();
    String::from_utf8(out).unwrap()
  }

  fn rows(csv_text: &str) -> Vec<Vec<String>> {
    csv::ReaderBuilder::new()
      .has_headers(false)
      .from_reader(csv_text.as_bytes())
      .records()
      .map(|r| r.unwrap().iter().map(String::from).collect())
      .collect()
  }

  #[test]
  fn test_header_has_core_then_extension_columns() {
    let table = rows(&export(&seeded()));
    let header = &table[0];
    assert_eq!(&header[..13], &CORE_COLUMNS.map(String::from)[..]);
    assert_eq!(&header[13..], &["Team".to_string(), "Sprint".to_string()]);
  }

  #[test]
  fn test_rows_in_calendar_order_with_formatted_cells() {
    let table = rows(&export(&seeded()));
    let keys: Vec<&str> = table[1..].iter().map(|r| r[0].as_str()).collect();
    assert_eq!(keys, vec!["PROJ-1", "PROJ-2", "PROJ-3"]);

    let first = &table[1];
    assert_eq!(first[1], "Bug");
    assert_eq!(first[9], "1.0, 1.1");
    assert_eq!(first[10], "PROJ-0 - Epic");
    let comments: Value = serde_json::from_str(&first[11]).unwrap();
    assert_eq!(comments, json!([{ "author": "Ada", "created": "2024-01-03", "body": "Looks good" }]));
    let changes: Value = serde_json::from_str(&first[12]).unwrap();
    assert_eq!(changes[0]["to"], "Done");
    assert_eq!(first[13], "Red");
    assert_eq!(first[14], "");

    assert_eq!(table[2][2], "Second, with comma");
    assert_eq!(table[2][13], "");
    assert_eq!(table[2][14], "S1 (closed)");
    assert_eq!(table[3][13], "Blue");
  }

  #[test]
  fn test_export_is_byte_identical_across_runs() {
    let storage = seeded();
    assert_eq!(export(&storage), export(&storage));
  }

  #[test]
  fn test_year_without_cache_is_an_error() {
    let mut out = Vec::new();
    let err = write_year(&seeded(), 2023, &catalog(), &FieldRoles::default(), &mut out).unwrap_err();
    assert!(err.to_string().contains("2023"));
    assert!(out.is_empty());
  }

  #[test]
  fn test_export_year_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = export_year(&seeded(), 2024, &catalog(), &FieldRoles::default(), dir.path()).unwrap();
    assert_eq!(path, dir.path().join("issues_2024.csv"));
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, export(&seeded()));
  }

  #[test]
  fn test_failed_export_keeps_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("issues_2023.csv");
    std::fs::write(&path, "previous").unwrap();

    let err = export_year(&seeded(), 2023, &catalog(), &FieldRoles::default(), dir.path());
    assert!(err.is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous");
    assert!(!dir.path().join("issues_2023.csv.tmp").exists());
  }

  #[test]
  fn test_export_without_catalog_has_core_columns_only() {
    let dir = tempfile::tempdir().unwrap();
    let path =
      export_year(&seeded(), 2024, &FieldCatalog::default(), &FieldRoles::default(), dir.path())
        .unwrap();
    let table = rows(&std::fs::read_to_string(path).unwrap());
    assert_eq!(table[0].len(), CORE_COLUMNS.len());
    assert_eq!(table.len(), 4);
  }
}

//! Terminal reports.

use color_eyre::Result;
use colored::Colorize;
use std::io::Write;

use crate::jira::api_types::IssueLink;
use crate::jira::fields::{comment_text, custom_fields};
use crate::jira::types::{BoardConfiguration, ProjectDetails};
use crate::jira::{FieldCatalog, FieldRoles, Issue};

const RULE_WIDTH: usize = 80;
const COMMENT_PREVIEW_CHARS: usize = 100;

fn rule() -> String {
  "=".repeat(RULE_WIDTH).bright_cyan().to_string()
}

fn or_none(value: Option<&str>) -> &str {
  value.filter(|v| !v.is_empty()).unwrap_or("None")
}

/// Cut `text` to `max` characters, marking the cut with `...`.
fn truncate(text: &str, max: usize) -> String {
  if text.chars().count() <= max {
    text.to_string()
  } else {
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut)
  }
}

fn link_label(link: &IssueLink) -> Option<String> {
  let kind = link
    .link_type
    .as_ref()
    .map(|t| t.name.as_str())
    .unwrap_or("Link");
  match (&link.outward_issue, &link.inward_issue) {
    (Some(out), _) => Some(format!("{} -> {}", kind, out.key)),
    (None, Some(inward)) => Some(format!("{} <- {}", kind, inward.key)),
    (None, None) => None,
  }
}

/// Full per-issue listing followed by a summary banner.
pub fn print_issues<W: Write>(
  out: &mut W,
  issues: &[Issue],
  catalog: &FieldCatalog,
  roles: &FieldRoles,
  timeframe: &str,
) -> Result<()> {
  for issue in issues {
    writeln!(out, "{}", rule())?;
    writeln!(out, "{} {}", issue.key.bright_white().bold(), issue.summary())?;
    writeln!(out, "  Type: {}", or_none(issue.issue_type_name()))?;
    writeln!(out, "  Status: {}", or_none(issue.status_name()))?;
    writeln!(out, "  Created: {}", or_none(issue.fields.created.as_deref()))?;
    writeln!(out, "  Updated: {}", or_none(issue.fields.updated.as_deref()))?;
    writeln!(out, "  Priority: {}", or_none(issue.priority_name()))?;
    writeln!(out, "  Reporter: {}", or_none(issue.reporter_name()))?;
    writeln!(out, "  Assignee: {}", or_none(issue.assignee_name()))?;

    let versions = issue.fix_version_names();
    if !versions.is_empty() {
      writeln!(out, "  Fix Versions: {}", versions.join(", "))?;
    }
    let parent = issue.parent_label();
    if !parent.is_empty() {
      writeln!(out, "  Parent: {}", parent)?;
    }

    for field in custom_fields(issue, catalog, roles) {
      writeln!(out, "  {}: {}", field.name, field.value)?;
    }

    let links: Vec<String> = issue.fields.issue_links.iter().filter_map(link_label).collect();
    if !links.is_empty() {
      writeln!(out, "  Linked Issues:")?;
      for link in links {
        writeln!(out, "    {}", link)?;
      }
    }

    let comments = issue.comments();
    if !comments.is_empty() {
      writeln!(out, "  Comments:")?;
      for comment in &comments {
        writeln!(
          out,
          "    [{}] {}: {}",
          or_none(comment.created.as_deref()),
          or_none(comment.author.as_deref()),
          comment_text(comment.body.as_ref())
        )?;
      }
    }

    let changes = issue.status_changes();
    if !changes.is_empty() {
      writeln!(out, "  Status Changes:")?;
      for change in &changes {
        writeln!(
          out,
          "    [{}] {}: {} -> {}",
          or_none(change.date.as_deref()),
          or_none(change.author.as_deref()),
          or_none(change.from.as_deref()),
          or_none(change.to.as_deref())
        )?;
      }
    }
  }

  writeln!(out, "{}", rule())?;
  writeln!(
    out,
    "Processed {} issues for {}",
    issues.len().to_string().bright_white().bold(),
    timeframe.bright_cyan()
  )?;
  writeln!(out, "{}", rule())?;
  Ok(())
}

/// End-of-day digest.
pub fn print_eod<W: Write>(
  out: &mut W,
  issues: &[Issue],
  completed_statuses: &[String],
  timeframe: &str,
) -> Result<()> {
  writeln!(out, "{}", rule())?;
  writeln!(out, "{}", format!("End of day report ({})", timeframe).bright_white().bold())?;
  writeln!(out, "{}", rule())?;

  if issues.is_empty() {
    writeln!(out, "No issues updated in {}", timeframe)?;
    return Ok(());
  }

  for issue in issues {
    writeln!(out, "\n{}: {}", issue.key.bright_white().bold(), issue.summary())?;
    writeln!(out, "  Current Status: {}", or_none(issue.status_name()))?;
    writeln!(out, "  Moved to To Do: {} times", issue.transitions_to("To Do"))?;

    let versions = issue.fix_version_names();
    writeln!(
      out,
      "  Fix Versions: {}",
      if versions.is_empty() { "None".to_string() } else { versions.join(", ") }
    )?;

    match issue.latest_comment() {
      Some((author, text)) => writeln!(
        out,
        "  Latest Comment ({}): {}",
        or_none(author),
        truncate(&text, COMMENT_PREVIEW_CHARS)
      )?,
      None => writeln!(out, "  Latest Comment: None")?,
    }

    if let Some(done) = issue.first_status_change_to(completed_statuses) {
      writeln!(
        out,
        "  Completed: {} ({})",
        or_none(done.date.as_deref()),
        or_none(done.to.as_deref())
      )?;
      if let Some(days) = issue.resolution_days(completed_statuses) {
        writeln!(out, "  Resolution Time: {:.1} days", days)?;
      }
    }
  }

  writeln!(out, "\n{} issues", issues.len().to_string().bright_white().bold())?;
  Ok(())
}

/// Board columns with the statuses mapped to each.
pub fn print_workflow_columns<W: Write>(out: &mut W, config: &BoardConfiguration) -> Result<()> {
  if config.columns.is_empty() {
    writeln!(out, "No board found for this project")?;
    return Ok(());
  }

  writeln!(out, "{}", "Workflow Columns".bright_white().bold())?;
  for column in &config.columns {
    let statuses: Vec<&str> = column.statuses.iter().map(|s| s.name.as_str()).collect();
    writeln!(out, "  {}: {}", column.name.bright_cyan(), statuses.join(", "))?;
  }
  Ok(())
}

pub fn print_project_details<W: Write>(out: &mut W, project: &ProjectDetails) -> Result<()> {
  writeln!(out, "{}", "Project Details".bright_white().bold())?;
  writeln!(out, "  Key: {}", project.key)?;
  writeln!(out, "  Name: {}", project.name)?;
  writeln!(out, "  Type: {}", or_none(project.project_type.as_deref()))?;
  writeln!(out, "  Lead: {}", or_none(project.lead.as_deref()))?;
  writeln!(out, "  Description: {}", or_none(project.description.as_deref()))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::jira::types::{BoardColumn, StatusInfo};
  use serde_json::{json, Value};

  fn issue(value: Value) -> Issue {
    serde_json::from_value(value).unwrap()
  }

  fn render(f: impl FnOnce(&mut Vec<u8>) -> Result<()>) -> String {
    let mut out = Vec::new();
    f(&mut out).unwrap();
    String::from_utf8(out).unwrap()
  }

  fn worked_issue() -> Issue {
    issue(json!({
      "key": "PROJ-9",
      "fields": {
        "summary": "Fix login",
        "status": { "name": "In Prod" },
        "created": "2024-01-01T00:00:00.000+0000",
        "fixVersions": [{ "name": "2.0" }],
        "issuelinks": [
          { "type": { "name": "Blocks" }, "outwardIssue": { "key": "PROJ-10" } },
          { "type": { "name": "Relates" }, "inwardIssue": { "key": "PROJ-11" } }
        ],
        "comment": { "comments": [
          { "author": { "displayName": "Bo" }, "created": "2024-01-02", "body": "x".repeat(150) }
        ]}
      },
      "changelog": { "histories": [
        { "created": "2024-01-02T00:00:00.000+0000",
          "items": [{ "field": "status", "fromString": "In Progress", "toString": "To Do" }] },
        { "created": "2024-01-03T12:00:00.000+0000",
          "items": [{ "field": "status", "fromString": "To Do", "toString": "In Prod" }] }
      ]}
    }))
  }

  #[test]
  fn test_issue_listing() {
    let text = render(|out| {
      print_issues(out, &[worked_issue()], &FieldCatalog::default(), &FieldRoles::default(), "today")
    });
    assert!(text.contains("Fix login"));
    assert!(text.contains("Fix Versions: 2.0"));
    assert!(text.contains("Blocks -> PROJ-10"));
    assert!(text.contains("Relates <- PROJ-11"));
    assert!(text.contains("To Do -> In Prod"));
    assert!(text.contains("Processed"));
  }

  #[test]
  fn test_eod_digest() {
    let completed = vec!["in prod".to_string()];
    let text = render(|out| print_eod(out, &[worked_issue()], &completed, "yesterday"));
    assert!(text.contains("Current Status: In Prod"));
    assert!(text.contains("Moved to To Do: 1 times"));
    assert!(text.contains(&format!("Latest Comment (Bo): {}...", "x".repeat(100))));
    assert!(text.contains("Completed: 2024-01-03T12:00:00.000+0000"));
    assert!(text.contains("Resolution Time: 2.5 days"));
  }

  #[test]
  fn test_eod_without_issues() {
    let text = render(|out| print_eod(out, &[], &[], "yesterday"));
    assert!(text.contains("No issues updated in yesterday"));
  }

  #[test]
  fn test_workflow_columns() {
    let config = BoardConfiguration {
      columns: vec![BoardColumn {
        name: "Doing".to_string(),
        statuses: vec![
          StatusInfo { name: "In Progress".into() },
          StatusInfo { name: "Review".into() },
        ],
      }],
    };
    let text = render(|out| print_workflow_columns(out, &config));
    assert!(text.contains("In Progress, Review"));
    let empty = render(|out| print_workflow_columns(out, &BoardConfiguration::default()));
    assert!(empty.contains("No board found"));
  }

  #[test]
  fn test_truncate_counts_chars() {
    assert_eq!(truncate("héllo", 10), "héllo");
    assert_eq!(truncate("héllo", 2), "hé...");
  }
}

//! Caching implementations for Jira types.

use crate::cache::Cacheable;

use super::api_types::Issue;

impl Cacheable for Issue {
  fn cache_key(&self) -> String {
    self.key.clone()
  }

  fn timestamp(&self, field: &str) -> Option<&str> {
    match field {
      "created" => self.fields.created.as_deref(),
      "updated" => self.fields.updated.as_deref(),
      other => self.fields.extensions.get(other).and_then(|v| v.as_str()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;
  use serde_json::json;

  #[test]
  fn test_partition_date_uses_local_calendar_day() {
    let issue: Issue = serde_json::from_value(json!({
      "key": "PROJ-3",
      "fields": {
        "created": "2024-01-31T23:59:00.000-0800",
        "updated": "2024-02-01T10:00:00.000+0000",
        "customfield_1": "2024-03-05"
      }
    }))
    .unwrap();

    assert_eq!(
      issue.partition_date("created"),
      NaiveDate::from_ymd_opt(2024, 1, 31)
    );
    assert_eq!(
      issue.partition_date("updated"),
      NaiveDate::from_ymd_opt(2024, 2, 1)
    );
    assert_eq!(
      issue.partition_date("customfield_1"),
      NaiveDate::from_ymd_opt(2024, 3, 5)
    );
  }

  #[test]
  fn test_missing_or_garbled_timestamp_has_no_partition() {
    let issue: Issue = serde_json::from_value(json!({
      "key": "PROJ-4",
      "fields": { "updated": "yesterday-ish" }
    }))
    .unwrap();

    assert_eq!(issue.partition_date("created"), None);
    assert_eq!(issue.partition_date("updated"), None);
  }
}

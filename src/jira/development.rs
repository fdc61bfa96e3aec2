//! Parser for the "Development" custom field.
//!
//! Jira Cloud renders this field as a Java-style map string rather than JSON:
//!
//! ```text
//! {pullrequest={dataType=pullrequest, state=MERGED, stateCount=1}, json={"cachedValue":{...}}}
//! ```
//!
//! Grammar:
//!
//! ```text
//! map     := '{' [ entry (',' entry)* ] '}'
//! entry   := key '=' value
//! value   := map | json | scalar
//! json    := balanced '{...}' whose key is "json", kept as raw JSON
//! scalar  := any text up to the next ',' or '}'
//! ```

use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DevelopmentParseError {
  #[error("expected '{expected}' at offset {offset}")]
  Expected { expected: char, offset: usize },
  #[error("unterminated value starting at offset {0}")]
  Unterminated(usize),
  #[error("unexpected trailing input at offset {0}")]
  Trailing(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DevValue {
  Scalar(String),
  Map(BTreeMap<String, DevValue>),
  /// Embedded JSON, or the raw text when it does not parse
  Json(Result<Value, String>),
}

/// Pull request roll-up shown for an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSummary {
  pub count: u64,
  pub state: String,
}

/// Parsed development field.
#[derive(Debug, Clone, PartialEq)]
pub struct DevelopmentField {
  pub entries: BTreeMap<String, DevValue>,
}

impl DevelopmentField {
  pub fn parse(input: &str) -> Result<Self, DevelopmentParseError> {
    let mut parser = Parser {
      src: input.trim(),
      pos: 0,
    };
    let entries = parser.map()?;
    parser.skip_ws();
    if parser.pos < parser.src.len() {
      return Err(DevelopmentParseError::Trailing(parser.pos));
    }
    Ok(Self { entries })
  }

  /// Pull request roll-up, preferring the structured `json` payload.
  pub fn pull_requests(&self) -> Option<PullRequestSummary> {
    self.json_summary().or_else(|| self.map_summary())
  }

  fn json_summary(&self) -> Option<PullRequestSummary> {
    let DevValue::Json(Ok(json)) = self.entries.get("json")? else {
      return None;
    };
    let overall = json.pointer("/cachedValue/summary/pullrequest/overall")?;
    let count = overall
      .get("count")
      .or_else(|| overall.get("stateCount"))
      .and_then(Value::as_u64)?;
    let state = overall.get("state").and_then(Value::as_str)?;
    Some(PullRequestSummary {
      count,
      state: state.to_string(),
    })
  }

  fn map_summary(&self) -> Option<PullRequestSummary> {
    let DevValue::Map(pr) = self.entries.get("pullrequest")? else {
      return None;
    };
    let scalar = |key: &str| match pr.get(key) {
      Some(DevValue::Scalar(s)) => Some(s.as_str()),
      _ => None,
    };
    Some(PullRequestSummary {
      count: scalar("stateCount").and_then(|s| s.parse().ok()).unwrap_or(0),
      state: scalar("state").unwrap_or("UNKNOWN").to_string(),
    })
  }
}

/// Display text for a raw development field value.
pub fn format_development(raw: &str) -> String {
  let raw = raw.trim();
  if raw.is_empty() || raw == "{}" {
    return "No development information".to_string();
  }

  match DevelopmentField::parse(raw) {
    Ok(field) => match field.pull_requests() {
      Some(pr) => format!("Pull Requests: {} ({})", pr.count, pr.state),
      None => raw.to_string(),
    },
    Err(e) => {
      tracing::debug!(error = %e, "unparseable development field");
      raw.to_string()
    }
  }
}

struct Parser<'a> {
  src: &'a str,
  pos: usize,
}

impl<'a> Parser<'a> {
  fn peek(&self) -> Option<char> {
    self.src[self.pos..].chars().next()
  }

  fn skip_ws(&mut self) {
    while let Some(c) = self.peek() {
      if !c.is_whitespace() {
        break;
      }
      self.pos += c.len_utf8();
    }
  }

  fn expect(&mut self, expected: char) -> Result<(), DevelopmentParseError> {
    self.skip_ws();
    if self.peek() == Some(expected) {
      self.pos += expected.len_utf8();
      Ok(())
    } else {
      Err(DevelopmentParseError::Expected {
        expected,
        offset: self.pos,
      })
    }
  }

  fn map(&mut self) -> Result<BTreeMap<String, DevValue>, DevelopmentParseError> {
    self.expect('{')?;
    let mut entries = BTreeMap::new();

    self.skip_ws();
    if self.peek() == Some('}') {
      self.pos += 1;
      return Ok(entries);
    }

    loop {
      let key = self.key()?;
      self.expect('=')?;
      self.skip_ws();
      let value = if key == "json" {
        let raw = self.balanced()?;
        DevValue::Json(serde_json::from_str(raw).map_err(|_| raw.to_string()))
      } else if self.peek() == Some('{') {
        DevValue::Map(self.map()?)
      } else {
        DevValue::Scalar(self.scalar())
      };
      entries.insert(key, value);

      self.skip_ws();
      match self.peek() {
        Some(',') => self.pos += 1,
        Some('}') => {
          self.pos += 1;
          return Ok(entries);
        }
        _ => {
          return Err(DevelopmentParseError::Expected {
            expected: '}',
            offset: self.pos,
          })
        }
      }
    }
  }

  fn key(&mut self) -> Result<String, DevelopmentParseError> {
    self.skip_ws();
    let start = self.pos;
    while let Some(c) = self.peek() {
      if c == '=' || c == ',' || c == '{' || c == '}' {
        break;
      }
      self.pos += c.len_utf8();
    }
    let key = self.src[start..self.pos].trim();
    if key.is_empty() {
      return Err(DevelopmentParseError::Expected {
        expected: '=',
        offset: start,
      });
    }
    Ok(key.to_string())
  }

  fn scalar(&mut self) -> String {
    let start = self.pos;
    while let Some(c) = self.peek() {
      if c == ',' || c == '}' {
        break;
      }
      self.pos += c.len_utf8();
    }
    self.src[start..self.pos].trim().to_string()
  }

  /// Consume a brace-balanced JSON value, honouring string literals.
  fn balanced(&mut self) -> Result<&'a str, DevelopmentParseError> {
    let start = self.pos;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in self.src[start..].char_indices() {
      if in_string {
        match c {
          _ if escaped => escaped = false,
          '\\' => escaped = true,
          '"' => in_string = false,
          _ => {}
        }
        continue;
      }
      match c {
        '"' => in_string = true,
        '{' | '[' => depth += 1,
        '}' | ']' => {
          depth = depth
            .checked_sub(1)
            .ok_or(DevelopmentParseError::Unterminated(start))?;
          if depth == 0 {
            self.pos = start + offset + c.len_utf8();
            return Ok(&self.src[start..self.pos]);
          }
        }
        _ => {}
      }
    }

    Err(DevelopmentParseError::Unterminated(start))
  }
}

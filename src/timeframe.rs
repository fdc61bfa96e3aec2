//! Timeframe expressions and their resolution into calendar date windows.
//!
//! A timeframe is what the user types after `--created` or `eod`: a keyword
//! (`today`, `week`, `all`, ...), a single `YYYY-MM-DD` date, or a pair of
//! dates. Resolution is pure; the caller supplies "today".

use chrono::{Datelike, Days, Months, NaiveDate};
use std::fmt;
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeframeError {
  #[error(
    "invalid timeframe '{0}': expected today, yesterday, week, month, year, all, \
     a date in YYYY-MM-DD format (e.g. 2024-01-01) or two such dates"
  )]
  Invalid(String),
  #[error("invalid date '{0}' in date range: expected YYYY-MM-DD format (e.g. 2024-01-31)")]
  InvalidDate(String),
  #[error("a date range needs exactly 2 dates in YYYY-MM-DD format, got {0}")]
  WrongArity(usize),
  #[error("date range ends ({end}) before it starts ({start})")]
  Reversed { start: NaiveDate, end: NaiveDate },
}

/// A parsed timeframe expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
  Today,
  Yesterday,
  Week,
  Month,
  Year,
  All,
  Day(NaiveDate),
  /// Inclusive on both ends.
  Range(NaiveDate, NaiveDate),
}

/// Half-open calendar interval `[start, end)`, or no bounds at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
  Unbounded,
  Bounded { start: NaiveDate, end: NaiveDate },
}

impl Timeframe {
  /// Parse command-line tokens into a timeframe.
  ///
  /// One token may be a keyword, a date, or two dates separated by
  /// whitespace. Two tokens are always a date pair.
  pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self, TimeframeError> {
    match tokens {
      [] => Err(TimeframeError::WrongArity(0)),
      [single] => Self::parse_single(single.as_ref()),
      [start, end] => Self::parse_pair(start.as_ref(), end.as_ref()),
      more => Err(TimeframeError::WrongArity(more.len())),
    }
  }

  fn parse_single(token: &str) -> Result<Self, TimeframeError> {
    let token = token.trim();
    match token.to_lowercase().as_str() {
      "today" => return Ok(Timeframe::Today),
      "yesterday" => return Ok(Timeframe::Yesterday),
      "week" => return Ok(Timeframe::Week),
      "month" => return Ok(Timeframe::Month),
      "year" => return Ok(Timeframe::Year),
      "all" => return Ok(Timeframe::All),
      _ => {}
    }

    let parts: Vec<&str> = token.split_whitespace().collect();
    match parts.as_slice() {
      [start, end] => Self::parse_pair(start, end),
      [date] => NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map(Timeframe::Day)
        .map_err(|_| TimeframeError::Invalid(token.to_string())),
      [] => Err(TimeframeError::WrongArity(0)),
      _ => Err(TimeframeError::WrongArity(parts.len())),
    }
  }

  fn parse_pair(start: &str, end: &str) -> Result<Self, TimeframeError> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    if end < start {
      return Err(TimeframeError::Reversed { start, end });
    }
    Ok(Timeframe::Range(start, end))
  }

  /// Resolve against the given current date.
  pub fn resolve(&self, today: NaiveDate) -> DateWindow {
    let (start, end) = match *self {
      Timeframe::All => return DateWindow::Unbounded,
      Timeframe::Today => (today, today + Days::new(1)),
      Timeframe::Yesterday => (today - Days::new(1), today),
      Timeframe::Week => {
        let weekday = u64::from(today.weekday().num_days_from_monday());
        // Monday through Friday; the end bound is Saturday.
        (today - Days::new(weekday), today - Days::new(weekday) + Days::new(5))
      }
      Timeframe::Month => {
        let first = today.with_day(1).unwrap_or(today);
        (first, first + Months::new(1))
      }
      Timeframe::Year => {
        let first = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        (first, first + Months::new(12))
      }
      Timeframe::Day(date) => (date, date + Days::new(1)),
      Timeframe::Range(start, end) => (start, end + Days::new(1)),
    };
    DateWindow::Bounded { start, end }
  }
}

impl fmt::Display for Timeframe {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Timeframe::Today => write!(f, "today"),
      Timeframe::Yesterday => write!(f, "yesterday"),
      Timeframe::Week => write!(f, "week"),
      Timeframe::Month => write!(f, "month"),
      Timeframe::Year => write!(f, "year"),
      Timeframe::All => write!(f, "all"),
      Timeframe::Day(date) => write!(f, "{}", date),
      Timeframe::Range(start, end) => write!(f, "{} to {}", start, end),
    }
  }
}

impl DateWindow {
  /// Lower and upper bound, `(None, None)` when unbounded.
  pub fn bounds(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match *self {
      DateWindow::Unbounded => (None, None),
      DateWindow::Bounded { start, end } => (Some(start), Some(end)),
    }
  }

  /// Every day in `[start, end)`. Empty when unbounded.
  pub fn days(&self) -> Vec<NaiveDate> {
    match *self {
      DateWindow::Unbounded => Vec::new(),
      DateWindow::Bounded { start, end } => start.iter_days().take_while(|d| *d < end).collect(),
    }
  }
}

fn parse_date(token: &str) -> Result<NaiveDate, TimeframeError> {
  NaiveDate::parse_from_str(token.trim(), DATE_FORMAT)
    .map_err(|_| TimeframeError::InvalidDate(token.to_string()))
}

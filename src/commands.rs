//! Command definitions and their handlers.

use chrono::{Datelike, Local, NaiveDate};
use clap::{Args, Subcommand};
use color_eyre::Result;
use std::io::Write;
use tracing::info;

use crate::cache::JsonFileStorage;
use crate::config::{Config, Connection};
use crate::export;
use crate::jira::{CachedJiraClient, DateField, FieldCatalog, IssueQuery};
use crate::report;
use crate::timeframe::Timeframe;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Show the project's board columns and the statuses in each
  WorkflowColumns,
  /// Show project key, name, type, lead and description
  ProjectDetails,
  /// Fetch issues by creation date, serving completed days from the cache
  Issues(IssuesArgs),
  /// End-of-day digest of recently updated issues (always fetched fresh)
  Eod(EodArgs),
  /// Export a year of cached issues to CSV
  IssuesToCsv {
    /// Year to export (defaults to the current year)
    #[arg(long)]
    year: Option<i32>,
  },
  /// Download the custom field catalog
  Fields,
}

#[derive(Args, Debug)]
pub struct IssuesArgs {
  /// today, yesterday, week, month, year, all, a date, or two dates
  #[arg(long, num_args = 1..=2, value_name = "TIMEFRAME")]
  pub created: Vec<String>,

  /// Only issues assigned to this user (repeatable)
  #[arg(long)]
  pub assignee: Vec<String>,

  /// Leave out issues in this status (repeatable)
  #[arg(long = "exclude-status", value_name = "STATUS")]
  pub exclude_status: Vec<String>,

  /// Print only the summary line
  #[arg(long)]
  pub silent: bool,

  /// Ignore the cache and do not update it
  #[arg(long)]
  pub skip_cache: bool,
}

#[derive(Args, Debug)]
pub struct EodArgs {
  /// Timeframe of the update date (defaults to yesterday)
  #[arg(num_args = 0..=2, value_name = "TIMEFRAME")]
  pub timeframe: Vec<String>,

  /// Assignees to report on (defaults to the configured email)
  #[arg(long)]
  pub assignee: Vec<String>,

  /// Leave out issues in this status (repeatable)
  #[arg(long = "exclude-status", value_name = "STATUS")]
  pub exclude_status: Vec<String>,
}

/// Parse timeframe tokens, using `default` when none were given.
fn timeframe_or(tokens: &[String], default: Timeframe) -> Result<Timeframe> {
  if tokens.is_empty() {
    Ok(default)
  } else {
    Ok(Timeframe::parse(tokens)?)
  }
}

impl IssuesArgs {
  pub fn query(&self, project: &str) -> Result<IssueQuery> {
    let timeframe = timeframe_or(&self.created, Timeframe::Today)?;
    let mut query = IssueQuery::new(project, DateField::Created, timeframe);
    query.assignees = self.assignee.clone();
    query.excluded_statuses = self.exclude_status.clone();
    query.bypass_cache = self.skip_cache;
    Ok(query)
  }
}

impl EodArgs {
  pub fn query(&self, project: &str, email: &str) -> Result<IssueQuery> {
    let timeframe = timeframe_or(&self.timeframe, Timeframe::Yesterday)?;
    let mut query = IssueQuery::new(project, DateField::Updated, timeframe);
    query.assignees = if self.assignee.is_empty() {
      vec![email.to_string()]
    } else {
      self.assignee.clone()
    };
    query.excluded_statuses = self.exclude_status.clone();
    query.bypass_cache = true;
    Ok(query)
  }
}

fn today() -> NaiveDate {
  Local::now().date_naive()
}

fn connect(config: &Config) -> Result<(CachedJiraClient, Connection)> {
  let conn = config.connection()?;
  let storage = JsonFileStorage::for_project(&config.storage.raw_dir, &conn.project);
  let client = CachedJiraClient::new(&conn, storage)?;
  Ok((client, conn))
}

/// Download the custom field catalog and save it.
async fn sync_fields(client: &CachedJiraClient, config: &Config) -> Result<FieldCatalog> {
  let catalog = client.get_custom_fields().await?;
  catalog.save(&config.storage.custom_fields)?;
  Ok(catalog)
}

pub async fn run(command: Command, config: &Config) -> Result<()> {
  let stdout = std::io::stdout();
  let mut out = stdout.lock();

  match command {
    Command::WorkflowColumns => {
      let (client, conn) = connect(config)?;
      let board = client.get_board_configuration(&conn.project).await?;
      report::print_workflow_columns(&mut out, &board)?;
    }

    Command::ProjectDetails => {
      let (client, conn) = connect(config)?;
      let project = client.get_project_details(&conn.project).await?;
      report::print_project_details(&mut out, &project)?;
    }

    Command::Issues(args) => {
      // Validate input before any network or disk access
      let project = config.require_project()?.to_string();
      let query = args.query(&project)?;
      let (client, _) = connect(config)?;

      let catalog = if config.storage.custom_fields.exists() {
        FieldCatalog::load(&config.storage.custom_fields)?
      } else {
        info!("field catalog missing, downloading it first");
        sync_fields(&client, config).await?
      };

      info!(cache = %client.cache_dir().display(), "using issue cache");
      let result = client.get_project_issues(&query, today()).await?;
      let label = query.timeframe.to_string();
      if args.silent {
        writeln!(out, "Processed {} issues for {} ({})", result.data.len(), label, result.source)?;
      } else {
        report::print_issues(&mut out, &result.data, &catalog, &config.fields, &label)?;
      }
    }

    Command::Eod(args) => {
      let project = config.require_project()?.to_string();
      let email = config.jira.email.clone().unwrap_or_default();
      let query = args.query(&project, &email)?;
      let (client, _) = connect(config)?;

      let result = client.get_project_issues(&query, today()).await?;
      report::print_eod(
        &mut out,
        &result.data,
        &config.completed_statuses,
        &query.timeframe.to_string(),
      )?;
    }

    Command::IssuesToCsv { year } => {
      let project = config.require_project()?;
      let year = year.unwrap_or_else(|| today().year());
      let storage = JsonFileStorage::for_project(&config.storage.raw_dir, project);
      let catalog = FieldCatalog::load(&config.storage.custom_fields)?;

      let path = export::export_year(
        &storage,
        year,
        &catalog,
        &config.fields,
        &config.storage.export_dir,
      )?;
      writeln!(out, "Exported issues for {} to {}", year, path.display())?;
    }

    Command::Fields => {
      let (client, _) = connect(config)?;
      let catalog = sync_fields(&client, config).await?;
      writeln!(
        out,
        "Saved {} custom fields to {}",
        catalog.len(),
        config.storage.custom_fields.display()
      )?;
    }
  }

  Ok(())
}

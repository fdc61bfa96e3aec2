use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::jira::FieldRoles;

const URL_VAR: &str = "JIRASCOPE_URL";
const EMAIL_VAR: &str = "JIRASCOPE_EMAIL";
const PROJECT_VAR: &str = "JIRASCOPE_PROJECT";
const TOKEN_VARS: [&str; 2] = ["JIRASCOPE_JIRA_TOKEN", "JIRA_API_TOKEN"];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  pub jira: JiraConfig,
  /// Project key used when `--project` is not given
  pub project: Option<String>,
  pub storage: StorageConfig,
  /// Display names of custom fields with bespoke formatting
  pub fields: FieldRoles,
  /// Statuses that mark an issue as done (case-insensitive)
  pub completed_statuses: Vec<String>,
  /// Also write logs to this file
  pub log_file: Option<PathBuf>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      jira: JiraConfig::default(),
      project: None,
      storage: StorageConfig::default(),
      fields: FieldRoles::default(),
      completed_statuses: vec![
        "In Prod".to_string(),
        "Duplicate".to_string(),
        "Cancelled".to_string(),
      ],
      log_file: None,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
  /// Auto-detect based on URL: .atlassian.net = cloud, else on-premise
  #[default]
  Auto,
  /// Jira Cloud - uses Basic auth (email + API token as password)
  Cloud,
  /// Jira On-premise - uses Bearer auth (PAT)
  Onpremise,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
  pub url: Option<String>,
  pub email: Option<String>,
  /// Authentication type: auto, cloud, or onpremise
  pub auth_type: AuthType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// Root of the per-project issue cache
  pub raw_dir: PathBuf,
  /// Where `issues-to-csv` writes
  pub export_dir: PathBuf,
  /// Custom field catalog file
  pub custom_fields: PathBuf,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      raw_dir: PathBuf::from("raw_data"),
      export_dir: PathBuf::from("csv_data"),
      custom_fields: PathBuf::from("config/jira_custom_fields.json"),
    }
  }
}

/// Everything needed to talk to one Jira project.
#[derive(Debug, Clone)]
pub struct Connection {
  pub url: String,
  pub email: String,
  pub token: String,
  pub project: String,
  /// Never `Auto`: resolved from the URL
  pub auth_type: AuthType,
}

impl Config {
  /// Load configuration from file and environment.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jirascope.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jirascope/config.yaml
  ///
  /// Without a file, defaults apply and settings come from the environment.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        debug!("no configuration file found, using defaults");
        Self::default()
      }
    };
    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("jirascope.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jirascope").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
  }

  /// Let environment variables override file settings.
  fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
    let set = |name: &str| var(name).filter(|v| !v.trim().is_empty());
    if let Some(url) = set(URL_VAR) {
      self.jira.url = Some(url);
    }
    if let Some(email) = set(EMAIL_VAR) {
      self.jira.email = Some(email);
    }
    if let Some(project) = set(PROJECT_VAR) {
      self.project = Some(project);
    }
  }

  /// Get the Jira API token from environment variables.
  ///
  /// Checks JIRASCOPE_JIRA_TOKEN first, then JIRA_API_TOKEN as fallback.
  pub fn get_api_token() -> Option<String> {
    TOKEN_VARS
      .iter()
      .find_map(|name| std::env::var(name).ok().filter(|t| !t.trim().is_empty()))
  }

  /// Project key, or an error naming how to set one.
  pub fn require_project(&self) -> Result<&str> {
    self
      .project
      .as_deref()
      .ok_or_else(|| eyre!("No project configured. Pass --project or set {}.", PROJECT_VAR))
  }

  /// Resolve the connection settings, reporting every missing one at once.
  pub fn connection(&self) -> Result<Connection> {
    self.connection_with_token(Self::get_api_token())
  }

  fn connection_with_token(&self, token: Option<String>) -> Result<Connection> {
    let mut missing = Vec::new();
    if self.jira.url.is_none() {
      missing.push(format!("Jira URL (jira.url or {})", URL_VAR));
    }
    if self.jira.email.is_none() {
      missing.push(format!("Jira email (jira.email or {})", EMAIL_VAR));
    }
    if token.is_none() {
      missing.push(format!("API token ({} or {})", TOKEN_VARS[0], TOKEN_VARS[1]));
    }
    if self.project.is_none() {
      missing.push(format!("project (--project, project or {})", PROJECT_VAR));
    }

    let (Some(url), Some(email), Some(token), Some(project)) = (
      self.jira.url.as_deref(),
      self.jira.email.as_deref(),
      token,
      self.project.as_deref(),
    ) else {
      return Err(eyre!("Missing configuration:\n  - {}", missing.join("\n  - ")));
    };

    let parsed = url::Url::parse(url).map_err(|e| eyre!("Invalid Jira URL {}: {}", url, e))?;
    let auth_type = match self.jira.auth_type {
      AuthType::Auto => {
        let cloud = parsed
          .host_str()
          .is_some_and(|host| host.ends_with(".atlassian.net"));
        if cloud {
          AuthType::Cloud
        } else {
          AuthType::Onpremise
        }
      }
      explicit => explicit,
    };

    Ok(Connection {
      url: url.trim_end_matches('/').to_string(),
      email: email.to_string(),
      token,
      project: project.to_string(),
      auth_type,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn configured() -> Config {
    let mut config = Config::default();
    config.jira.url = Some("https://acme.atlassian.net/".to_string());
    config.jira.email = Some("ada@acme.io".to_string());
    config.project = Some("PROJ".to_string());
    config
  }

  #[test]
  fn test_yaml_with_defaults() {
    let config: Config = serde_yaml::from_str(
      "jira:\n  url: https://jira.acme.io\n  email: ada@acme.io\n  auth_type: onpremise\nproject: OPS\nfields:\n  sprint: Iteration\n",
    )
    .unwrap();

    assert_eq!(config.jira.auth_type, AuthType::Onpremise);
    assert_eq!(config.project.as_deref(), Some("OPS"));
    assert_eq!(config.fields.sprint, "Iteration");
    assert_eq!(config.fields.development, "Development");
    assert_eq!(config.storage.raw_dir, PathBuf::from("raw_data"));
    assert_eq!(config.completed_statuses, vec!["In Prod", "Duplicate", "Cancelled"]);
  }

  #[test]
  fn test_env_overrides_file() {
    let env: HashMap<&str, &str> = [(URL_VAR, "https://other.atlassian.net"), (PROJECT_VAR, "ENV")]
      .into_iter()
      .collect();
    let mut config = configured();
    config.apply_env(|name| env.get(name).map(|v| v.to_string()));

    assert_eq!(config.jira.url.as_deref(), Some("https://other.atlassian.net"));
    assert_eq!(config.jira.email.as_deref(), Some("ada@acme.io"));
    assert_eq!(config.project.as_deref(), Some("ENV"));
  }

  #[test]
  fn test_connection_detects_cloud() {
    let conn = configured()
      .connection_with_token(Some("secret".to_string()))
      .unwrap();
    assert_eq!(conn.auth_type, AuthType::Cloud);
    assert_eq!(conn.url, "https://acme.atlassian.net");
    assert_eq!(conn.project, "PROJ");
  }

  #[test]
  fn test_connection_detects_onpremise() {
    let mut config = configured();
    config.jira.url = Some("https://jira.acme.io".to_string());
    let conn = config.connection_with_token(Some("pat".to_string())).unwrap();
    assert_eq!(conn.auth_type, AuthType::Onpremise);
  }

  #[test]
  fn test_every_missing_setting_is_reported() {
    let err = Config::default()
      .connection_with_token(None)
      .unwrap_err()
      .to_string();
    assert!(err.contains(URL_VAR));
    assert!(err.contains(EMAIL_VAR));
    assert!(err.contains("JIRA_API_TOKEN"));
    assert!(err.contains(PROJECT_VAR));
  }

  #[test]
  fn test_invalid_url_is_rejected() {
    let mut config = configured();
    config.jira.url = Some("not a url".to_string());
    let err = config
      .connection_with_token(Some("t".to_string()))
      .unwrap_err();
    assert!(err.to_string().contains("Invalid Jira URL"));
  }

  #[test]
  fn test_explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::load(Some(dir.path().join("nope.yaml").as_path())).is_err());
  }
}

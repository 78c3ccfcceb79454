//! Bridge configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.trackbridge/
//!   config.yaml      (BridgeConfig — optional, every field defaults)
//!   mappings.json    (identity store, see `identity`)
//! ```
//!
//! Environment variables override the file (see [`BridgeConfig::apply_env`]).
//! The engine never reads either source itself: callers turn a
//! [`BridgeConfig`] into an immutable [`SyncConfig`] once per run.
//!
//! # API pattern
//!
//! Path-touching functions come in two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{config_io, ConfigError};
use crate::identity::{default_store_path_at, IdentityStore};
use crate::types::StatusCategory;

pub const CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_LINEAR_API_URL: &str = "https://api.linear.app/graphql";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

/// `<home>/.trackbridge/`
pub fn bridge_root(home: &Path) -> PathBuf {
    home.join(".trackbridge")
}

/// `<home>/.trackbridge/config.yaml`
pub fn config_path_at(home: &Path) -> PathBuf {
    bridge_root(home).join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// Status mode
// ---------------------------------------------------------------------------

/// Which direction(s) workflow state is propagated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMode {
    Off,
    #[default]
    JiraToLinear,
    Bidirectional,
}

impl StatusMode {
    /// Jira status drives the Linear state.
    pub fn pushes_to_linear(self) -> bool {
        matches!(self, StatusMode::JiraToLinear | StatusMode::Bidirectional)
    }

    /// Linear state drives the Jira status.
    pub fn pulls_from_linear(self) -> bool {
        matches!(self, StatusMode::Bidirectional)
    }
}

impl fmt::Display for StatusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusMode::Off => write!(f, "off"),
            StatusMode::JiraToLinear => write!(f, "jira_to_linear"),
            StatusMode::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

impl FromStr for StatusMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "off" => Ok(StatusMode::Off),
            "jira_to_linear" => Ok(StatusMode::JiraToLinear),
            "bidirectional" => Ok(StatusMode::Bidirectional),
            other => Err(ConfigError::Invalid {
                field: "status_mode".to_string(),
                message: format!(
                    "unknown mode '{other}'; expected: off, jira_to_linear, bidirectional"
                ),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Mapping tables
// ---------------------------------------------------------------------------

/// Linear state name to use for each Jira status category.
///
/// A `None` entry means "do not touch Linear for this category".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryStates {
    pub new: Option<String>,
    pub indeterminate: Option<String>,
    pub done: Option<String>,
}

impl Default for CategoryStates {
    fn default() -> Self {
        Self {
            new: Some("Todo".to_string()),
            indeterminate: Some("In Progress".to_string()),
            done: Some("Done".to_string()),
        }
    }
}

impl CategoryStates {
    pub fn get(&self, category: StatusCategory) -> Option<&str> {
        match category {
            StatusCategory::New => self.new.as_deref(),
            StatusCategory::Indeterminate => self.indeterminate.as_deref(),
            StatusCategory::Done => self.done.as_deref(),
        }
    }
}

/// Immutable per-run engine input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncConfig {
    /// Linear project whose issues are scanned.
    pub project_id: String,
    /// Compute and count changes without writing anything.
    pub dry_run: bool,
    pub status_mode: StatusMode,
    pub linear_state_for_jira_category: CategoryStates,
    /// Exact Jira status name → Linear state name; wins over the category table.
    pub linear_state_for_jira_status: BTreeMap<String, String>,
    /// Linear state name → Jira status name.
    pub jira_status_for_linear_state: BTreeMap<String, String>,
}

impl SyncConfig {
    /// A config with default mapping tables for `project_id`.
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dry_run: false,
            status_mode: StatusMode::default(),
            linear_state_for_jira_category: CategoryStates::default(),
            linear_state_for_jira_status: BTreeMap::new(),
            jira_status_for_linear_state: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// File-backed configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraSettings {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<String>,
}

/// Validated Jira credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JiraCredentials {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
}

impl JiraSettings {
    pub fn credentials(&self) -> Result<JiraCredentials, ConfigError> {
        Ok(JiraCredentials {
            base_url: required(&self.base_url, "jira.base_url", "JIRA_BASE_URL")?,
            email: required(&self.email, "jira.email", "JIRA_EMAIL")?,
            api_token: required(&self.api_token, "jira.api_token", "JIRA_API_TOKEN")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearSettings {
    pub api_url: String,
    pub api_key: Option<String>,
}

impl Default for LinearSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_LINEAR_API_URL.to_string(),
            api_key: None,
        }
    }
}

impl LinearSettings {
    pub fn api_key(&self) -> Result<String, ConfigError> {
        required(&self.api_key, "linear.api_key", "LINEAR_API_KEY")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Seconds between scheduled runs; `0` disables the schedule.
    pub poll_interval_secs: u64,
    /// When set, socket-triggered syncs must present this token.
    pub trigger_token: Option<String>,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            trigger_token: None,
        }
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub project_id: Option<String>,
    pub dry_run: bool,
    pub status_mode: StatusMode,
    pub linear_state_for_jira_category: CategoryStates,
    pub linear_state_for_jira_status: BTreeMap<String, String>,
    pub jira_status_for_linear_state: BTreeMap<String, String>,
    pub store_path: Option<PathBuf>,
    pub jira: JiraSettings,
    pub linear: LinearSettings,
    pub daemon: DaemonSettings,
}

impl BridgeConfig {
    /// Load `path`, returning defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(config_io(path, err)),
        };
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `<home>/.trackbridge/config.yaml`.
    pub fn load_at(home: &Path) -> Result<Self, ConfigError> {
        Self::load_from(&config_path_at(home))
    }

    /// Load the file under `home`, then apply process environment overrides.
    pub fn from_env_at(home: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_at(home)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Overlay environment settings read through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("LINEAR_SYNC_PROJECT_ID") {
            self.project_id = Some(v);
        }
        if let Some(v) = var("DRY_RUN") {
            self.dry_run = v == "1";
        }
        if let Some(v) = var("SYNC_STATUS_MODE") {
            self.status_mode = v.parse()?;
        }
        if let Some(v) = var("LINEAR_STATE_FOR_JIRA_NEW") {
            self.linear_state_for_jira_category.new = Some(v);
        }
        if let Some(v) = var("LINEAR_STATE_FOR_JIRA_INDETERMINATE") {
            self.linear_state_for_jira_category.indeterminate = Some(v);
        }
        if let Some(v) = var("LINEAR_STATE_FOR_JIRA_DONE") {
            self.linear_state_for_jira_category.done = Some(v);
        }
        if let Some(v) = var("JIRA_STATUS_FOR_LINEAR_STATE_NAME_JSON") {
            self.jira_status_for_linear_state =
                serde_json::from_str(&v).map_err(|e| ConfigError::Invalid {
                    field: "JIRA_STATUS_FOR_LINEAR_STATE_NAME_JSON".to_string(),
                    message: e.to_string(),
                })?;
        }
        if let Some(v) = var("JIRA_BASE_URL") {
            self.jira.base_url = Some(v);
        }
        if let Some(v) = var("JIRA_EMAIL") {
            self.jira.email = Some(v);
        }
        if let Some(v) = var("JIRA_API_TOKEN") {
            self.jira.api_token = Some(v);
        }
        if let Some(v) = var("LINEAR_API_KEY") {
            self.linear.api_key = Some(v);
        }
        if let Some(v) = var("SYNC_TRIGGER_TOKEN") {
            self.daemon.trigger_token = Some(v);
        }
        Ok(())
    }

    /// Build the immutable engine configuration.
    pub fn sync_config(&self) -> Result<SyncConfig, ConfigError> {
        Ok(SyncConfig {
            project_id: required(&self.project_id, "project_id", "LINEAR_SYNC_PROJECT_ID")?,
            dry_run: self.dry_run,
            status_mode: self.status_mode,
            linear_state_for_jira_category: self.linear_state_for_jira_category.clone(),
            linear_state_for_jira_status: self.linear_state_for_jira_status.clone(),
            jira_status_for_linear_state: self.jira_status_for_linear_state.clone(),
        })
    }

    /// The identity store this configuration points at.
    pub fn identity_store_at(&self, home: &Path) -> IdentityStore {
        match &self.store_path {
            Some(path) => IdentityStore::new(path.clone()),
            None => IdentityStore::new(default_store_path_at(home)),
        }
    }
}

/// Atomically save `config` to `<home>/.trackbridge/config.yaml`.
pub fn save_at(home: &Path, config: &BridgeConfig) -> Result<PathBuf, ConfigError> {
    let yaml = serde_yaml::to_string(config)?;
    write_config_at(home, &yaml)
}

/// Write raw YAML to the config location (`.tmp` + rename).
pub fn write_config_at(home: &Path, yaml: &str) -> Result<PathBuf, ConfigError> {
    let root = bridge_root(home);
    std::fs::create_dir_all(&root).map_err(|e| config_io(&root, e))?;
    let path = config_path_at(home);
    let tmp = root.join(format!("{CONFIG_FILE}.tmp"));
    std::fs::write(&tmp, yaml).map_err(|e| config_io(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| config_io(&path, e))?;
    Ok(path)
}

/// Commented starting point written by `trackbridge init`.
pub const CONFIG_TEMPLATE: &str = r#"# trackbridge configuration.
# Secrets are better supplied through JIRA_API_TOKEN, LINEAR_API_KEY and
# SYNC_TRIGGER_TOKEN than written here.

# Linear project whose issues are scanned (LINEAR_SYNC_PROJECT_ID).
project_id: ~

dry_run: false

# off | jira_to_linear | bidirectional
status_mode: jira_to_linear

linear_state_for_jira_category:
  new: Todo
  indeterminate: In Progress
  done: Done

# Exact Jira status name -> Linear state name. Wins over the category table.
linear_state_for_jira_status: {}

# Linear state name -> Jira status name (used in bidirectional mode).
jira_status_for_linear_state: {}

jira:
  base_url: ~
  email: ~

linear:
  api_url: https://api.linear.app/graphql

daemon:
  poll_interval_secs: 300
"#;

fn required(
    value: &Option<String>,
    field: &'static str,
    hint: &'static str,
) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .ok_or(ConfigError::Missing { field, hint })
}

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calendar::DateFormat;
use crate::error::{Result, SyncError};
use crate::types::{MetricKey, ScheduleSpec};

/// Bearer token for the metrics API. Required for `run`.
pub const API_TOKEN_ENV: &str = "VITALSYNC_API_TOKEN";
/// Optional override for the config file location.
pub const CONFIG_PATH_ENV: &str = "VITALSYNC_CONFIG";
/// Prefix for figment env overrides, e.g. `VITALSYNC_API__TIMEOUT_SECS=10`.
pub const ENV_PREFIX: &str = "VITALSYNC_";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
pub const MAX_DECIMAL_PLACES: u8 = 5;

/// Top-level config (config.toml + VITALSYNC_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub vault: VaultConfig,
    pub table: TableConfig,
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay; each further retry doubles it.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Root directory holding the monthly files. Must be absolute.
    pub path: PathBuf,
    /// File name prefix: `{prefix}-{Month}.md`.
    pub file_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default)]
    pub alignment: Alignment,
    pub columns: Vec<ColumnConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Date,
    Metric,
    /// Free-text column (e.g. Notes), always written empty.
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub metric_key: Option<MetricKey>,
    /// Falls back to [`MetricKey::default_decimals`] when unset.
    #[serde(default)]
    pub decimal_places: Option<u8>,
}

impl ColumnConfig {
    pub fn date(name: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: ColumnType::Date,
            metric_key: None,
            decimal_places: None,
        }
    }

    pub fn metric(name: &str, key: MetricKey, decimal_places: Option<u8>) -> Self {
        Self {
            name: name.to_string(),
            column_type: ColumnType::Metric,
            metric_key: Some(key),
            decimal_places,
        }
    }

    pub fn custom(name: &str) -> Self {
        Self {
            name: name.to_string(),
            column_type: ColumnType::Custom,
            metric_key: None,
            decimal_places: None,
        }
    }

    /// Effective decimal places for a metric column.
    pub fn decimals(&self) -> u8 {
        self.decimal_places
            .or_else(|| self.metric_key.map(|k| k.default_decimals()))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub run_time: ScheduleSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub file: String,
    /// Rotate the log file daily.
    #[serde(default = "bool_true")]
    pub rotation: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
            file: default_log_file(),
            rotation: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Allow writing a sample whose date is outside the current month.
    #[serde(default)]
    pub allow_historical: bool,
    /// Skip the append when a row for the date already exists.
    #[serde(default = "bool_true")]
    pub deduplication: bool,
    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,
    /// A run holding the lock longer than this is logged as overdue.
    #[serde(default = "default_lock_stale_secs")]
    pub lock_stale_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            allow_historical: false,
            deduplication: true,
            lock_path: default_lock_path(),
            lock_stale_secs: default_lock_stale_secs(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_backoff_base_ms() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}
fn default_title() -> String {
    "Health Metrics".to_string()
}
fn default_date_format() -> String {
    "MM/DD".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_log_file() -> String {
    "vitalsync.log".to_string()
}
fn default_lock_path() -> PathBuf {
    PathBuf::from(".vitalsync.lock")
}
fn default_lock_stale_secs() -> u64 {
    6 * 60 * 60
}

impl AppConfig {
    /// Load config from a TOML file with VITALSYNC_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `VITALSYNC_CONFIG`
    ///   3. ~/.vitalsync/config.toml
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(config_path);
        if !path.is_file() {
            return Err(SyncError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let mut config: AppConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        config.validate()?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            config.anchor_paths(dir);
        }
        debug!(path = %path.display(), vault = %config.vault.path.display(), "configuration loaded");
        Ok(config)
    }

    /// Resolve relative `logging.dir` and `execution.lock_path` against `base`.
    pub fn anchor_paths(&mut self, base: &Path) {
        if self.logging.dir.is_relative() {
            self.logging.dir = base.join(&self.logging.dir);
        }
        if self.execution.lock_path.is_relative() {
            self.execution.lock_path = base.join(&self.execution.lock_path);
        }
    }

    /// Parse and validate config from TOML text, without env overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: AppConfig = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        let url = &self.api.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            problems.push(format!("api.base_url must be an http(s) URL, got {url:?}"));
        }
        if !(1..=300).contains(&self.api.timeout_secs) {
            problems.push(format!(
                "api.timeout_secs must be between 1 and 300, got {}",
                self.api.timeout_secs
            ));
        }

        if !self.vault.path.is_absolute() {
            problems.push(format!(
                "vault.path must be an absolute path, got {}",
                self.vault.path.display()
            ));
        }
        let prefix = &self.vault.file_prefix;
        if prefix.is_empty()
            || !prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            problems.push(format!(
                "vault.file_prefix must contain only alphanumeric characters, dashes and underscores, got {prefix:?}"
            ));
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            problems.push(format!(
                "logging.level must be one of trace, debug, info, warn, error, got {:?}",
                self.logging.level
            ));
        }

        if let Err(e) = DateFormat::new(&self.table.date_format) {
            problems.push(format!("table.{e}"));
        }
        problems.extend(validate_columns(&self.table.columns));

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Config(format!(
                "validation failed:\n  {}",
                problems.join("\n  ")
            )))
        }
    }

    /// Parsed date pattern. Only fails on a config that skipped [`validate`](Self::validate).
    pub fn date_format(&self) -> Result<DateFormat> {
        DateFormat::new(&self.table.date_format).map_err(SyncError::Config)
    }
}

fn validate_columns(columns: &[ColumnConfig]) -> Vec<String> {
    let mut problems = Vec::new();
    if columns.is_empty() {
        problems.push("table.columns must not be empty".to_string());
        return problems;
    }
    if !columns.iter().any(|c| c.column_type == ColumnType::Date) {
        problems.push("table.columns must include a column of type 'date'".to_string());
    }

    let mut seen = HashSet::new();
    for col in columns {
        let name = col.name.trim();
        if name.is_empty() {
            problems.push("table.columns: column name must not be empty".to_string());
        } else if name.contains('|') {
            problems.push(format!("table.columns: column name {name:?} must not contain '|'"));
        } else if !seen.insert(name.to_string()) {
            problems.push(format!("table.columns: duplicate column name {name:?}"));
        }

        if col.column_type == ColumnType::Metric && col.metric_key.is_none() {
            problems.push(format!(
                "table.columns: column {name:?} of type 'metric' must have metric_key"
            ));
        }
        if col.decimal_places.is_some_and(|d| d > MAX_DECIMAL_PLACES) {
            problems.push(format!(
                "table.columns: column {name:?} decimal_places must be at most {MAX_DECIMAL_PLACES}"
            ));
        }
    }
    problems
}

/// Explicit path > `VITALSYNC_CONFIG` > ~/.vitalsync/config.toml.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".vitalsync").join("config.toml")
}

//! Application configuration for AmendWatch.
//!
//! User config lives at `~/.amendwatch/amendwatch.toml`.
//! CLI flags override environment variables, which override config file
//! values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AmendWatchError, Result};
use crate::types::Partition;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "amendwatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".amendwatch";

/// Env var overriding `[notify] from`.
pub const FROM_EMAIL_ENV: &str = "AMENDWATCH_FROM_EMAIL";

/// Env var overriding `[notify] to` (comma-separated).
pub const TO_EMAILS_ENV: &str = "AMENDWATCH_TO_EMAILS";

// ---------------------------------------------------------------------------
// Config structs (matching amendwatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream listing site.
    #[serde(default)]
    pub source: SourceConfig,

    /// Local database.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Reconciliation policy.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Bill resolution.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Digest delivery.
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Origin prefixed to every relative link found in listings and bill pages.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path of the senate amendment report.
    #[serde(default = "default_senate_path")]
    pub senate_path: String,

    /// Path of the house amendment report.
    #[serde(default = "default_house_path")]
    pub house_path: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Skip TLS certificate verification. The upstream site serves an
    /// incomplete chain, and only public pages are fetched.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            senate_path: default_senate_path(),
            house_path: default_house_path(),
            timeout_secs: default_timeout_secs(),
            accept_invalid_certs: true,
        }
    }
}

impl SourceConfig {
    /// Full listing endpoint for a partition.
    pub fn listing_url(&self, partition: Partition) -> String {
        let path = match partition {
            Partition::Senate => &self.senate_path,
            Partition::House => &self.house_path,
        };
        format!("{}{}", self.origin.trim_end_matches('/'), path)
    }
}

fn default_origin() -> String {
    "https://cga.ct.gov".into()
}
fn default_senate_path() -> String {
    "/asp/CGAAmendProc/CGASenateAmendRptDisp.asp".into()
}
fn default_house_path() -> String {
    "/asp/CGAAmendProc/CGAHouseAmendRptDisp.asp".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the libSQL database file. A leading `~/` expands to the home directory.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.amendwatch/amendwatch.db".into()
}

/// What reconciliation does when the known-record scan fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadFailurePolicy {
    /// Treat the known set as empty and report every candidate as new.
    #[default]
    AssumeEmpty,
    /// Write nothing and report no new records.
    Abort,
}

/// `[reconcile]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default)]
    pub on_read_failure: ReadFailurePolicy,
}

/// `[resolver]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Whether to resolve bill documents for new amendments.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum bill detail pages fetched at once.
    #[serde(default = "default_resolver_concurrency")]
    pub concurrency: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: default_resolver_concurrency(),
        }
    }
}

fn default_resolver_concurrency() -> usize {
    4
}

/// `[notify]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Sender address. Digests are not sent when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Recipient addresses. Digests are not sent when empty.
    #[serde(default)]
    pub to: Vec<String>,

    /// Directory where outgoing digest messages are written.
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            from: None,
            to: Vec::new(),
            outbox_dir: default_outbox_dir(),
        }
    }
}

fn default_outbox_dir() -> String {
    "~/.amendwatch/outbox".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.amendwatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AmendWatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.amendwatch/amendwatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk, then apply environment overrides.
/// Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    let config = if path.exists() {
        load_config_from(&path)?
    } else {
        tracing::debug!(?path, "config file not found, using defaults");
        AppConfig::default()
    };

    Ok(with_env_overrides(config))
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AmendWatchError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        AmendWatchError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Apply `AMENDWATCH_FROM_EMAIL` / `AMENDWATCH_TO_EMAILS` if set.
pub fn with_env_overrides(config: AppConfig) -> AppConfig {
    apply_overrides(
        config,
        std::env::var(FROM_EMAIL_ENV).ok(),
        std::env::var(TO_EMAILS_ENV).ok(),
    )
}

fn apply_overrides(mut config: AppConfig, from: Option<String>, to: Option<String>) -> AppConfig {
    if let Some(from) = from.filter(|f| !f.trim().is_empty()) {
        config.notify.from = Some(from.trim().to_string());
    }
    if let Some(to) = to {
        let recipients: Vec<String> = to
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if !recipients.is_empty() {
            config.notify.to = recipients;
        }
    }
    config
}

/// Check values that serde cannot.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let origin = Url::parse(&config.source.origin).map_err(|e| {
        AmendWatchError::config(format!("invalid [source] origin '{}': {e}", config.source.origin))
    })?;
    if origin.scheme() != "http" && origin.scheme() != "https" {
        return Err(AmendWatchError::config(format!(
            "[source] origin must be http or https, got '{}'",
            origin.scheme()
        )));
    }
    if config.resolver.concurrency == 0 {
        return Err(AmendWatchError::config(
            "[resolver] concurrency must be at least 1",
        ));
    }
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AmendWatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AmendWatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AmendWatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

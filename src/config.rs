//! Configuration management for BackOffice Fetcher
//!
//! This module provides unified configuration management with automatic
//! first-run initialization, multi-source loading, and zero-config defaults.
//! Missing sections and keys fall back to their defaults, so older files keep
//! working when new settings are introduced.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::models::{ApplicationType, SourceKind};
use crate::app::progress::ProgressPlan;
use crate::constants::{collaborator, config_files, distribution, env, transfer};
use crate::errors::{AppError, ConfigError, ConfigResult, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General settings
    pub settings: SettingsConfig,
    /// Remote sources and their priority
    pub sources: SourcesConfig,
    /// Application type to local directory prefix
    pub local_names: BTreeMap<String, String>,
    /// Progress phase windows
    pub progress: ProgressPlan,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings: SettingsConfig::default(),
            sources: SourcesConfig::default(),
            local_names: default_local_names(),
            progress: ProgressPlan::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Root directory holding local distributions
    pub installer_root: PathBuf,
    /// Executable marking a complete distribution
    pub marker_executable: String,
    /// Directory for the scratch archive (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,
    /// HTTP request timeout
    #[serde(with = "humantime_serde")]
    pub http_request_timeout: Duration,
    /// How long the config patcher waits for the client config file
    #[serde(with = "humantime_serde")]
    pub config_file_wait_timeout: Duration,
    /// Poll interval of the config patcher
    #[serde(with = "humantime_serde")]
    pub config_file_check_interval: Duration,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            installer_root: default_installer_root(),
            marker_executable: distribution::DEFAULT_MARKER_EXECUTABLE.to_string(),
            scratch_dir: None,
            http_request_timeout: transfer::DEFAULT_HTTP_TIMEOUT,
            config_file_wait_timeout: collaborator::CONFIG_FILE_WAIT_TIMEOUT,
            config_file_check_interval: collaborator::CONFIG_FILE_CHECK_INTERVAL,
        }
    }
}

impl SettingsConfig {
    /// Directory the scratch archive is written to
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Remote source settings and priority
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Source names in priority order
    pub order: Vec<String>,
    /// File share source
    pub share: ShareSourceConfig,
    /// HTTP source
    pub http: HttpSourceConfig,
    /// FTP source
    pub ftp: FtpSourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            order: SourceKind::ALL.iter().map(|k| k.to_string()).collect(),
            share: ShareSourceConfig::default(),
            http: HttpSourceConfig::default(),
            ftp: FtpSourceConfig::default(),
        }
    }
}

impl SourcesConfig {
    /// Parsed priority list
    ///
    /// Unknown names are logged and skipped; a source listed twice is only
    /// tried at its first position.
    pub fn priority(&self) -> Vec<SourceKind> {
        let mut seen = HashSet::new();
        let mut kinds = Vec::new();
        for name in &self.order {
            match name.parse::<SourceKind>() {
                Ok(kind) => {
                    if seen.insert(kind) {
                        kinds.push(kind);
                    } else {
                        debug!("Source '{}' listed more than once, ignoring repeat", name);
                    }
                }
                Err(e) => warn!("Skipping entry in source priority list: {}", e),
            }
        }
        kinds
    }

    /// Whether the given source is enabled
    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Share => self.share.enabled,
            SourceKind::Http => self.http.enabled,
            SourceKind::Ftp => self.ftp.enabled,
        }
    }

    /// Enabled sources in priority order
    pub fn enabled_in_priority(&self) -> Vec<SourceKind> {
        self.priority()
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    /// Archive name template for the source and application type
    pub fn archive_template(&self, kind: SourceKind, app_type: &ApplicationType) -> Option<&str> {
        let names = match kind {
            SourceKind::Share => &self.share.archive_names,
            SourceKind::Http => &self.http.archive_names,
            SourceKind::Ftp => &self.ftp.archive_names,
        };
        names
            .get(app_type.as_str())
            .map(String::as_str)
            .filter(|template| !template.trim().is_empty())
    }
}

/// File share source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareSourceConfig {
    pub enabled: bool,
    /// Share root (UNC path or mounted directory)
    pub path: Option<PathBuf>,
    /// Application type to archive name template
    pub archive_names: BTreeMap<String, String>,
}

impl Default for ShareSourceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: Some(PathBuf::from(r"\\fileserver\distr\iikoBacks")),
            archive_names: default_archive_names(),
        }
    }
}

/// HTTP source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSourceConfig {
    pub enabled: bool,
    /// Base URL of the directory holding the archives
    pub url: Option<String>,
    /// Application type to archive name template
    pub archive_names: BTreeMap<String, String>,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: Some("https://distr.example.com/iikoBacks".to_string()),
            archive_names: default_archive_names(),
        }
    }
}

/// FTP source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FtpSourceConfig {
    pub enabled: bool,
    pub host: Option<String>,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Remote directory holding the archives
    pub directory: Option<String>,
    /// Application type to archive name template
    pub archive_names: BTreeMap<String, String>,
}

impl Default for FtpSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: Some("ftp.example.com".to_string()),
            port: transfer::DEFAULT_FTP_PORT,
            username: transfer::DEFAULT_FTP_USERNAME.to_string(),
            password: String::new(),
            directory: Some("/iikoBacks".to_string()),
            archive_names: default_archive_names(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
    /// Enable file logging
    pub file_logging: bool,
    /// Log file path (if file_logging is enabled)
    pub log_file: Option<PathBuf>,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file_logging: false,
            log_file: None,
            colored_output: true,
        }
    }
}

impl LoggingConfig {
    /// Log file path, defaulting to `debug_log.log` in the working directory
    pub fn log_file_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("debug_log.log"))
    }
}

fn default_archive_names() -> BTreeMap<String, String> {
    [
        ("iikoRMS", "RMSOffice{version}.zip"),
        ("iikoChain", "ChainOffice{version}.zip"),
        ("SyrveRMS", "Syrve/RMSSOffice{version}.zip"),
        ("SyrveChain", "Syrve/ChainSOffice{version}.zip"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_local_names() -> BTreeMap<String, String> {
    [
        ("iikoRMS", "RMSOffice"),
        ("iikoChain", "ChainOffice"),
        ("SyrveRMS", "RMSSOffice"),
        ("SyrveChain", "ChainSOffice"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_installer_root() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\iiko_Distr")
    } else {
        dirs::data_local_dir()
            .map(|dir| dir.join(config_files::APP_CONFIG_DIR).join("distr"))
            .unwrap_or_else(|| PathBuf::from("./distr"))
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (if exists)
    /// 3. Environment variables
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        let config_path = if let Some(ref path) = config_file_override {
            Some(path.clone())
        } else {
            Self::find_config_file().await?
        };

        if let Some(path) = config_path {
            if path.exists() {
                debug!("Loading config from: {}", path.display());
                config = Self::load_from_file(&path).await?;
            } else if config_file_override.is_some() {
                return Err(ConfigError::NotFound { path }.into());
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply overrides from environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var(env::FTP_PASSWORD) {
            debug!("FTP password taken from {}", env::FTP_PASSWORD);
            self.sources.ftp.password = password;
        }
        if let Ok(root) = std::env::var(env::INSTALLER_ROOT) {
            if !root.trim().is_empty() {
                debug!("Installer root taken from {}: {}", env::INSTALLER_ROOT, root);
                self.settings.installer_root = PathBuf::from(root);
            }
        }
    }

    /// Initialize configuration on first run
    ///
    /// Creates a default config file if none exists and notifies the user
    pub async fn initialize_first_run() -> Result<Option<PathBuf>> {
        let config_path = Self::get_default_config_path()?;

        if config_path.exists() {
            return Ok(Some(config_path));
        }

        info!("Creating default configuration file...");
        Self::write_default_config(&config_path).await?;

        println!("📁 Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   You can customize sources and settings by editing this file.");
        println!();

        Ok(Some(config_path))
    }

    /// Write the commented default configuration to `path`
    pub async fn write_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::generic(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tokio::fs::write(path, Self::generate_default_config_content())
            .await
            .map_err(|e| {
                AppError::generic(format!(
                    "Failed to write config file {}: {}",
                    path.display(),
                    e
                ))
            })
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<PathBuf>> {
        let search_paths = vec![
            PathBuf::from(".").join(config_files::LOCAL_CONFIG_FILE),
            PathBuf::from(".").join(config_files::FALLBACK_CONFIG_FILE),
            Self::get_default_config_path()?,
        ];

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Ok(Some(path));
            }
        }

        debug!("No config file found in standard locations");
        Ok(None)
    }

    /// Get the default config file path for the current user
    pub fn get_default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::generic("Could not determine user config directory"))?;

        Ok(config_dir
            .join(config_files::APP_CONFIG_DIR)
            .join(config_files::FALLBACK_CONFIG_FILE))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::generic(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Local directory name for an application type and formatted version
    pub fn local_dir_name(&self, app_type: &ApplicationType, formatted_version: &str) -> Option<String> {
        self.local_names
            .get(app_type.as_str())
            .filter(|prefix| !prefix.trim().is_empty())
            .map(|prefix| format!("{}{}", prefix, formatted_version))
    }

    /// Validate the configuration, collecting every problem found
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.settings.marker_executable.trim().is_empty() {
            errors.push("settings.marker_executable must not be empty".to_string());
        }
        if self.settings.http_request_timeout.is_zero() {
            errors.push("settings.http_request_timeout must be greater than zero".to_string());
        }
        if self.sources.priority().is_empty() {
            errors.push("sources.order lists no known source".to_string());
        }
        if self.sources.ftp.enabled && self.sources.ftp.port == 0 {
            errors.push("sources.ftp.port must not be 0".to_string());
        }
        if let Some(url) = self.sources.http.url.as_deref() {
            if self.sources.http.enabled && url::Url::parse(url).is_err() {
                errors.push(format!("sources.http.url is not a valid URL: {}", url));
            }
        }
        if let Err(e) = self.progress.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# BackOffice Fetcher Configuration
# This file was automatically generated on first run.
# Missing keys fall back to built-in defaults.

[settings]
# Root directory for local distributions
installer_root = '{installer_root}'

# Executable that marks a complete distribution
marker_executable = "{marker}"

# Directory for the temporary archive (defaults to the system temp dir)
# scratch_dir = "/path/to/scratch"

http_request_timeout = "15s"

# Used by the client config patcher
config_file_wait_timeout = "60s"
config_file_check_interval = "100ms"

[sources]
# Sources are tried strictly in this order; the first success wins.
# Known names: share (alias smb), http, ftp
order = ["share", "http", "ftp"]

[sources.share]
enabled = false
path = '\\fileserver\distr\iikoBacks'

# {{version}} is replaced with the formatted version; a leading folder
# (e.g. "Syrve/") selects a vendor-specific subdirectory
[sources.share.archive_names]
iikoRMS = "RMSOffice{{version}}.zip"
iikoChain = "ChainOffice{{version}}.zip"
SyrveRMS = "Syrve/RMSSOffice{{version}}.zip"
SyrveChain = "Syrve/ChainSOffice{{version}}.zip"

[sources.http]
enabled = true
url = "https://distr.example.com/iikoBacks"

[sources.http.archive_names]
iikoRMS = "RMSOffice{{version}}.zip"
iikoChain = "ChainOffice{{version}}.zip"
SyrveRMS = "Syrve/RMSSOffice{{version}}.zip"
SyrveChain = "Syrve/ChainSOffice{{version}}.zip"

[sources.ftp]
enabled = true
host = "ftp.example.com"
port = {ftp_port}
username = "{ftp_user}"
# Prefer the {password_env} environment variable over storing it here
password = ""
directory = "/iikoBacks"

[sources.ftp.archive_names]
iikoRMS = "RMSOffice{{version}}.zip"
iikoChain = "ChainOffice{{version}}.zip"
SyrveRMS = "Syrve/RMSSOffice{{version}}.zip"
SyrveChain = "Syrve/ChainSOffice{{version}}.zip"

[local_names]
# Local directory prefix per application type; the formatted version is appended
iikoRMS = "RMSOffice"
iikoChain = "ChainOffice"
SyrveRMS = "RMSSOffice"
SyrveChain = "ChainSOffice"

[progress]
# Phase windows on the 0-100 progress scale
check_local = {{ lower = 0.0, upper = 5.0 }}
download = {{ lower = 5.0, upper = 55.0 }}
extract = {{ lower = 55.0, upper = 85.0 }}
stage = {{ lower = 85.0, upper = 95.0 }}
verify = {{ lower = 95.0, upper = 100.0 }}

[logging]
level = "warn"  # error, warn, info, debug, trace
file_logging = false
colored_output = true
# log_file = "debug_log.log"
"#,
            installer_root = default_installer_root().display(),
            marker = distribution::DEFAULT_MARKER_EXECUTABLE,
            ftp_port = transfer::DEFAULT_FTP_PORT,
            ftp_user = transfer::DEFAULT_FTP_USERNAME,
            password_env = env::FTP_PASSWORD,
        )
    }
}

//! Data models for distribution acquisition
//!
//! This module defines the request, source and installation types that flow
//! through the acquisition pipeline, along with the helpers that derive
//! formatted versions and application types from server-reported values.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::distribution;

/// Transport kinds a distribution can be fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// File share (UNC path or mounted directory)
    Share,
    /// Streaming HTTP(S) download
    Http,
    /// FTP binary retrieval
    Ftp,
}

impl SourceKind {
    /// All source kinds in their default priority order
    pub const ALL: [SourceKind; 3] = [SourceKind::Share, SourceKind::Http, SourceKind::Ftp];

    /// Lowercase name as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Share => "share",
            SourceKind::Http => "http",
            SourceKind::Ftp => "ftp",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "share" | "smb" => Ok(SourceKind::Share),
            "http" | "https" => Ok(SourceKind::Http),
            "ftp" => Ok(SourceKind::Ftp),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

/// Product line plus edition key, e.g. `iikoRMS` or `SyrveChain`
///
/// Used to look up archive name templates and local directory prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationType(String);

impl ApplicationType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the application type and vendor from the target address and the
    /// edition reported by the server
    ///
    /// Returns `None` when the edition is empty or unrecognised, in which case
    /// the caller has to ask the user.
    pub fn from_edition(target: &str, edition: &str) -> Option<(ApplicationType, String)> {
        let vendor = if target.to_lowercase().contains("syrve") {
            distribution::ALTERNATE_VENDOR
        } else {
            distribution::DEFAULT_VENDOR
        };

        let suffix = match edition.trim().to_lowercase().as_str() {
            "default" => "RMS",
            "chain" => "Chain",
            _ => return None,
        };

        Some((
            ApplicationType(format!("{}{}", vendor, suffix)),
            vendor.to_string(),
        ))
    }

    /// Vendor implied by the application type prefix
    pub fn implied_vendor(&self) -> &'static str {
        let prefix = distribution::ALTERNATE_VENDOR.to_lowercase();
        if self.0.to_lowercase().starts_with(&prefix) {
            distribution::ALTERNATE_VENDOR
        } else {
            distribution::DEFAULT_VENDOR
        }
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplicationType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Fold a dotted version into the short digit token used in archive and
/// directory names
///
/// The first digit of the leading numeric run of each dot-separated part is
/// kept until three digits are collected: `8.8.7012.0` becomes `887`. Parts
/// without a leading digit are skipped. When no digit can be extracted the
/// input is returned unchanged.
pub fn format_version(version: &str) -> String {
    let version = version.trim();
    if version.is_empty() {
        return String::new();
    }

    let digits: String = version
        .split('.')
        .filter_map(|part| part.chars().next().filter(char::is_ascii_digit))
        .take(distribution::FORMATTED_VERSION_DIGITS)
        .collect();

    if digits.is_empty() {
        tracing::warn!(
            "Could not extract version digits from '{}', using it unchanged",
            version
        );
        return version.to_string();
    }

    digits
}

/// Returns true when the value is already a formatted (digits only) version
pub fn is_formatted_version(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// One acquisition invocation; immutable once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionRequest {
    app_type: ApplicationType,
    formatted_version: String,
    vendor: String,
    local_root: PathBuf,
}

impl AcquisitionRequest {
    pub fn new(
        app_type: impl Into<ApplicationType>,
        formatted_version: impl Into<String>,
        vendor: impl Into<String>,
        local_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            app_type: app_type.into(),
            formatted_version: formatted_version.into(),
            vendor: vendor.into(),
            local_root: local_root.into(),
        }
    }

    pub fn app_type(&self) -> &ApplicationType {
        &self.app_type
    }

    pub fn formatted_version(&self) -> &str {
        &self.formatted_version
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }
}

impl From<String> for ApplicationType {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Local directory holding (or about to hold) a distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInstallation {
    /// Installation directory, `<local_root>/<prefix><version>`
    pub directory: PathBuf,
    /// Marker executable at the top level of `directory`
    pub marker_path: PathBuf,
}

impl LocalInstallation {
    pub fn new(local_root: &Path, directory_name: &str, marker_executable: &str) -> Self {
        let directory = local_root.join(directory_name);
        let marker_path = directory.join(marker_executable);
        Self {
            directory,
            marker_path,
        }
    }

    /// Name of the installation directory
    pub fn directory_name(&self) -> String {
        self.directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Scratch directory used while unpacking into this installation
    pub fn scratch_extract_dir(&self) -> PathBuf {
        self.directory.join(distribution::SCRATCH_EXTRACT_DIR)
    }

    /// Whether the marker executable is present as a regular file
    pub async fn has_marker(&self) -> bool {
        tokio::fs::metadata(&self.marker_path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }
}

/// How the returned installation came to exist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallationOrigin {
    /// A valid local copy was already present
    Existing,
    /// The distribution was fetched from the named source during this run
    Downloaded { source: SourceKind },
}

/// Successful acquisition result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquiredInstallation {
    #[serde(flatten)]
    pub installation: LocalInstallation,
    pub origin: InstallationOrigin,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub completed_at: DateTime<Utc>,
}

impl AcquiredInstallation {
    pub fn directory(&self) -> &Path {
        &self.installation.directory
    }
}

//! Error types for BackOffice Fetcher
//!
//! Per-source failures ([`FetchError`]) are absorbed by the installation
//! transaction, which moves on to the next source. Terminal failures
//! ([`AcquireError`]) reach the caller after the transaction has rolled back.

use std::path::PathBuf;

use thiserror::Error;

use crate::app::models::SourceKind;

/// Failure of a single source attempt
#[derive(Error, Debug)]
pub enum FetchError {
    /// Source is enabled but lacks a base location or archive name template
    #[error("{kind} source misconfigured: {reason}")]
    Misconfigured { kind: SourceKind, reason: String },

    /// Source could not be reached, authenticated against, or did not hold the archive
    #[error("{kind} source unavailable: {reason}")]
    Unavailable { kind: SourceKind, reason: String },

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// FTP protocol error
    #[error("FTP transfer failed: {0}")]
    Ftp(String),

    /// I/O error while reading from the source
    #[error("I/O error reading from source: {0}")]
    Io(#[from] std::io::Error),

    /// The local scratch archive could not be written
    #[error("Cannot write scratch archive {}: {cause}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    /// A blocking transfer task panicked or was aborted
    #[error("Transfer task failed: {0}")]
    Task(String),
}

impl FetchError {
    /// Whether the failure belongs to the source and the next source should be tried
    ///
    /// Faults on the local side (scratch archive not writable, a crashed
    /// transfer task) end the acquisition instead.
    pub fn is_source_failure(&self) -> bool {
        !matches!(self, FetchError::Destination { .. } | FetchError::Task(_))
    }

    pub(crate) fn unavailable(kind: SourceKind, reason: impl Into<String>) -> Self {
        FetchError::Unavailable {
            kind,
            reason: reason.into(),
        }
    }

    pub(crate) fn misconfigured(kind: SourceKind, reason: impl Into<String>) -> Self {
        FetchError::Misconfigured {
            kind,
            reason: reason.into(),
        }
    }
}

impl From<suppaftp::FtpError> for FetchError {
    fn from(err: suppaftp::FtpError) -> Self {
        FetchError::Ftp(err.to_string())
    }
}

/// Archive extraction and content discovery errors
#[derive(Error, Debug)]
pub enum StageError {
    /// Archive cannot be opened or parsed as a ZIP container
    #[error("Archive {} is corrupt or not a ZIP container: {reason}", archive.display())]
    ArchiveCorrupt { archive: PathBuf, reason: String },

    /// Extraction succeeded but no directory contains the marker executable
    #[error("{marker} not found anywhere in archive {}", archive.display())]
    ContentNotFound { archive: PathBuf, marker: String },

    /// I/O error writing extracted entries
    #[error("I/O error during extraction: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking extraction task panicked or was aborted
    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Terminal acquisition failures surfaced to the caller
#[derive(Error, Debug)]
pub enum AcquireError {
    /// No local directory prefix is configured for the application type
    #[error("No local directory name configured for application type '{app_type}'")]
    UnknownApplicationType { app_type: String },

    /// Formatted version is not a digit string
    #[error("Invalid formatted version '{version}': expected ASCII digits only")]
    InvalidVersion { version: String },

    /// Configured directory prefix does not name a direct child of the root
    #[error("Local directory name '{name}' must be a single path component")]
    InvalidDirectoryName { name: String },

    /// Every enabled source failed or none was enabled
    #[error("Could not fetch the distribution from any source (tried: {})", display_attempts(attempted))]
    AllSourcesExhausted { attempted: Vec<SourceKind> },

    /// Downloaded archive is not a readable container
    #[error("Archive {} is corrupt or not a ZIP container: {reason}", archive.display())]
    ArchiveCorrupt { archive: PathBuf, reason: String },

    /// Archive holds no directory with the marker executable
    #[error("{marker} not found in archive {}", archive.display())]
    ContentNotFound { archive: PathBuf, marker: String },

    /// Moving extracted content into the installation directory failed
    #[error("Failed to move {} into the installation directory: {cause}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    /// Marker executable missing at the top level after staging
    #[error("Marker executable missing after staging: {}", path.display())]
    PostMoveMarkerMissing { path: PathBuf },

    /// Vendor metadata of the staged executable names another publisher
    #[error("Distribution vendor '{found}' does not match expected '{expected}'")]
    VendorMismatch { expected: String, found: String },

    /// Unexpected filesystem fault
    #[error("Filesystem error while {context}: {cause}")]
    Filesystem {
        context: String,
        #[source]
        cause: std::io::Error,
    },

    /// Caller requested cancellation between phases
    #[error("Acquisition cancelled")]
    Cancelled,
}

fn display_attempts(attempted: &[SourceKind]) -> String {
    if attempted.is_empty() {
        "no enabled sources".to_string()
    } else {
        attempted
            .iter()
            .map(|kind| kind.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl AcquireError {
    pub(crate) fn filesystem(context: impl Into<String>, cause: std::io::Error) -> Self {
        AcquireError::Filesystem {
            context: context.into(),
            cause,
        }
    }

    /// Stable short name of the failure reason
    pub fn reason(&self) -> &'static str {
        match self {
            AcquireError::UnknownApplicationType { .. } => "unknown_application_type",
            AcquireError::InvalidVersion { .. } => "invalid_version",
            AcquireError::InvalidDirectoryName { .. } => "invalid_directory_name",
            AcquireError::AllSourcesExhausted { .. } => "all_sources_exhausted",
            AcquireError::ArchiveCorrupt { .. } => "archive_corrupt",
            AcquireError::ContentNotFound { .. } => "content_not_found",
            AcquireError::Staging { .. } => "staging_error",
            AcquireError::PostMoveMarkerMissing { .. } => "post_move_marker_missing",
            AcquireError::VendorMismatch { .. } => "vendor_mismatch",
            AcquireError::Filesystem { .. } => "filesystem_error",
            AcquireError::Cancelled => "cancelled",
        }
    }
}

impl From<StageError> for AcquireError {
    fn from(err: StageError) -> Self {
        match err {
            StageError::ArchiveCorrupt { archive, reason } => {
                AcquireError::ArchiveCorrupt { archive, reason }
            }
            StageError::ContentNotFound { archive, marker } => {
                AcquireError::ContentNotFound { archive, marker }
            }
            StageError::Io(cause) => AcquireError::filesystem("extracting archive", cause),
            StageError::Task(reason) => AcquireError::filesystem(
                "extracting archive",
                std::io::Error::other(reason),
            ),
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required configuration field
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {}", errors.join("; "))]
    ValidationFailed { errors: Vec<String> },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Acquisition error
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    /// Source fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Acquire(_) => "acquisition",
            AppError::Fetch(_) => "fetch",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Staging result type alias
pub type StageResult<T> = std::result::Result<T, StageError>;

/// Acquisition result type alias
pub type AcquireResult<T> = std::result::Result<T, AcquireError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

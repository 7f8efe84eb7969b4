//! Application constants for BackOffice Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Overrides the FTP password from the configuration file
    pub const FTP_PASSWORD: &str = "BACKOFFICE_FETCHER_FTP_PASSWORD";

    /// Overrides the local installer root from the configuration file
    pub const INSTALLER_ROOT: &str = "BACKOFFICE_FETCHER_INSTALLER_ROOT";
}

/// Distribution layout constants
pub mod distribution {
    /// Executable whose presence marks a complete distribution root
    pub const DEFAULT_MARKER_EXECUTABLE: &str = "BackOffice.exe";

    /// Scratch directory created inside the local installation directory
    /// while an archive is being unpacked
    pub const SCRATCH_EXTRACT_DIR: &str = "temp_extract_folder";

    /// Extension given to the scratch archive file
    pub const SCRATCH_ARCHIVE_EXTENSION: &str = "zip";

    /// Placeholder substituted with the formatted version in archive name templates
    pub const VERSION_PLACEHOLDER: &str = "{version}";

    /// Number of leading version components folded into a formatted version
    pub const FORMATTED_VERSION_DIGITS: usize = 3;

    /// Vendor used when the target does not identify one
    pub const DEFAULT_VENDOR: &str = "iiko";

    /// Alternate vendor line
    pub const ALTERNATE_VENDOR: &str = "Syrve";
}

/// Transfer tuning shared by the fetchers
pub mod transfer {
    use super::Duration;

    /// Copy buffer for share sources (1 MiB)
    pub const SHARE_CHUNK_SIZE: usize = 1024 * 1024;

    /// Write buffer for FTP retrievals
    pub const FTP_CHUNK_SIZE: usize = 8 * 1024;

    /// Default HTTP request timeout
    pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

    /// Connection establishment timeout used by HTTP and FTP
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Longest silence tolerated on an FTP control or data connection
    pub const FTP_READ_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default FTP control port
    pub const DEFAULT_FTP_PORT: u16 = 21;

    /// Default FTP user when none is configured
    pub const DEFAULT_FTP_USERNAME: &str = "anonymous";

    /// User agent for all HTTP requests
    pub const USER_AGENT: &str = "BackOffice-Fetcher/0.1.0 (Distribution Acquisition Tool)";
}

/// Default progress phase windows on the 0-100 scale
pub mod progress {
    /// Local installation lookup
    pub const CHECK_LOCAL: (f64, f64) = (0.0, 5.0);

    /// Archive transfer from the winning source
    pub const DOWNLOAD: (f64, f64) = (5.0, 55.0);

    /// Archive extraction
    pub const EXTRACT: (f64, f64) = (55.0, 85.0);

    /// Moving content into the installation directory
    pub const STAGE: (f64, f64) = (85.0, 95.0);

    /// Marker and vendor verification plus scratch cleanup
    pub const VERIFY: (f64, f64) = (95.0, 100.0);
}

/// Settings consumed by the client config patching collaborator
pub mod collaborator {
    use super::Duration;

    /// How long to wait for the client to write its config file
    pub const CONFIG_FILE_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Poll interval while waiting for the config file
    pub const CONFIG_FILE_CHECK_INTERVAL: Duration = Duration::from_millis(100);
}

/// Configuration file locations
pub mod config_files {
    /// Project-local configuration file name
    pub const LOCAL_CONFIG_FILE: &str = "backoffice-fetcher.toml";

    /// Generic project-local configuration file name
    pub const FALLBACK_CONFIG_FILE: &str = "config.toml";

    /// Directory under the user config dir
    pub const APP_CONFIG_DIR: &str = "backoffice-fetcher";
}

// Re-export commonly used constants at module level for convenience
pub use distribution::DEFAULT_MARKER_EXECUTABLE;
pub use transfer::{DEFAULT_HTTP_TIMEOUT, USER_AGENT};

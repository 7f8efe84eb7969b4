//! Prelude module for BackOffice Fetcher Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use backoffice_fetcher::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use backoffice_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Arc::new(AppConfig::load(None).await?);
//!     let request = AcquisitionRequest::new("iikoRMS", "887", "iiko", &config.settings.installer_root);
//!
//!     let acquired = InstallationTransaction::new(config).acquire(&request).await?;
//!     println!("{}", acquired.directory().display());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AcquireError, AppError, Result};

// Engine components used in most integrations
pub use crate::app::{
    AcquiredInstallation,
    AcquisitionRequest,
    ApplicationType,
    CancellationFlag,
    InstallationOrigin,
    InstallationTransaction,
    ProgressPlan,
    Severity,
    SourceKind,
    VendorProbe,

    format_version,
};

// Configuration
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{DEFAULT_HTTP_TIMEOUT, DEFAULT_MARKER_EXECUTABLE, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;

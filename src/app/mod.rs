//! Core acquisition engine for BackOffice Fetcher
//!
//! This module contains the components that turn an acquisition request into
//! a verified local distribution: the source resolver, the transport
//! fetchers, the archive stager, the vendor probe, the progress aggregator and
//! the installation transaction that binds them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use backoffice_fetcher::app::{format_version, AcquisitionRequest, InstallationTransaction};
//! use backoffice_fetcher::config::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(AppConfig::load(None).await?);
//! let version = format_version("8.8.7012.0");
//!
//! let request = AcquisitionRequest::new(
//!     "iikoRMS",
//!     version,
//!     "iiko",
//!     &config.settings.installer_root,
//! );
//! let acquired = InstallationTransaction::new(config).acquire(&request).await?;
//! println!("Distribution at {}", acquired.directory().display());
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod fetch;
pub mod models;
pub mod progress;
pub mod resolver;
pub mod stager;
pub mod status;
pub mod transaction;
pub mod vendor;

// Re-export main public API
pub use cancel::CancellationFlag;
pub use fetch::{Fetcher, TransferProgress};
pub use models::{
    AcquiredInstallation, AcquisitionRequest, ApplicationType, InstallationOrigin,
    LocalInstallation, SourceKind, format_version, is_formatted_version,
};
pub use progress::{Phase, PhaseBounds, ProgressAggregator, ProgressPlan, ProgressSink};
pub use resolver::{ResolvedLocation, resolve};
pub use status::{Severity, SilentStatus, StatusReporter, StatusSink};
pub use transaction::{InstallationTransaction, TransactionState};
pub use vendor::{VendorCheck, VendorProbe, VersionInfoProbe};

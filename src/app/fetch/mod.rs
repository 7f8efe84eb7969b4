//! Transport fetchers
//!
//! One capability, three transports: copy a remotely addressed archive to a
//! local path while reporting byte-level progress. The transport is picked
//! from configuration through the [`Fetcher`] enum.
//!
//! Ordinary failures (host unreachable, file missing, permission denied) come
//! back as [`FetchError`] values; the caller decides whether to move on to the
//! next source via [`FetchError::is_source_failure`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::app::models::SourceKind;
use crate::app::resolver::{LocationTarget, ResolvedLocation};
use crate::config::AppConfig;
use crate::errors::{FetchError, FetchResult};

pub mod ftp;
pub mod http;
pub mod share;

pub use ftp::FtpFetcher;
pub use http::HttpFetcher;
pub use share::ShareFetcher;

/// Byte-level transfer progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferProgress {
    /// Total size is known
    Bytes { transferred: u64, total: u64 },
    /// The source did not report a size
    Indeterminate { transferred: u64 },
}

impl TransferProgress {
    pub fn new(transferred: u64, total: Option<u64>) -> Self {
        match total {
            Some(total) => TransferProgress::Bytes { transferred, total },
            None => TransferProgress::Indeterminate { transferred },
        }
    }

    pub fn transferred(&self) -> u64 {
        match self {
            TransferProgress::Bytes { transferred, .. } => *transferred,
            TransferProgress::Indeterminate { transferred } => *transferred,
        }
    }

    /// Completed fraction, or `None` when the total is unknown
    ///
    /// An empty file is complete as soon as the transfer starts.
    pub fn fraction(&self) -> Option<f64> {
        match self {
            TransferProgress::Bytes { total: 0, .. } => Some(1.0),
            TransferProgress::Bytes { transferred, total } => {
                Some((*transferred as f64 / *total as f64).min(1.0))
            }
            TransferProgress::Indeterminate { .. } => None,
        }
    }
}

/// Callback receiving transfer progress; may be invoked from a blocking thread
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Transport selected by configuration
pub enum Fetcher {
    Share(ShareFetcher),
    Http(HttpFetcher),
    Ftp(FtpFetcher),
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fetcher::{}", self.kind())
    }
}

impl Fetcher {
    /// Build the fetcher for a source kind from the configuration
    pub fn for_kind(kind: SourceKind, config: &AppConfig) -> FetchResult<Self> {
        let fetcher = match kind {
            SourceKind::Share => Fetcher::Share(ShareFetcher::new()),
            SourceKind::Http => Fetcher::Http(HttpFetcher::new(config.settings.http_request_timeout)?),
            SourceKind::Ftp => Fetcher::Ftp(FtpFetcher::new()),
        };
        Ok(fetcher)
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Fetcher::Share(_) => SourceKind::Share,
            Fetcher::Http(_) => SourceKind::Http,
            Fetcher::Ftp(_) => SourceKind::Ftp,
        }
    }

    /// Copy the archive at `location` to `destination`
    ///
    /// Returns the number of bytes written. `destination` is created or
    /// truncated; the caller owns its removal on failure.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Misconfigured` if the location was resolved for
    /// another transport, otherwise whatever the transport reports.
    pub async fn fetch(
        &self,
        location: &ResolvedLocation,
        destination: &Path,
        progress: ProgressCallback,
    ) -> FetchResult<u64> {
        debug!("Fetching {} via {} into {}", location, self.kind(), destination.display());

        let bytes = match (self, &location.target) {
            (Fetcher::Share(fetcher), LocationTarget::Share(path)) => {
                fetcher.fetch(path, destination, progress).await?
            }
            (Fetcher::Http(fetcher), LocationTarget::Http(url)) => {
                fetcher.fetch(url, destination, progress).await?
            }
            (Fetcher::Ftp(fetcher), LocationTarget::Ftp(target)) => {
                fetcher.fetch(target, destination, progress).await?
            }
            _ => {
                return Err(FetchError::misconfigured(
                    self.kind(),
                    format!("location {} was resolved for the {} source", location, location.kind),
                ))
            }
        };

        info!("Fetched {} ({} bytes) from {}", location.file_name(), bytes, self.kind());
        Ok(bytes)
    }
}

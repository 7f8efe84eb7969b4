//! Installation transaction
//!
//! Owns the lifecycle of one local installation directory: check for a valid
//! existing copy, otherwise fetch the archive from the first source that
//! delivers it, unpack, move the content into place, verify the vendor and
//! commit. Any terminal failure rolls back everything the transaction
//! created, so the installation directory is either complete and verified
//! or absent when [`InstallationTransaction::acquire`] returns.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use backoffice_fetcher::app::{AcquisitionRequest, InstallationTransaction};
//! use backoffice_fetcher::config::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(AppConfig::load(None).await?);
//! let transaction = InstallationTransaction::new(Arc::clone(&config))
//!     .with_progress_sink(Arc::new(|percent: f64| println!("{:.0}%", percent)));
//!
//! let request = AcquisitionRequest::new("iikoRMS", "887", "iiko", &config.settings.installer_root);
//! let acquired = transaction.acquire(&request).await?;
//! println!("Ready at {}", acquired.directory().display());
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod state;

#[cfg(test)]
pub mod tests;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::app::cancel::CancellationFlag;
use crate::app::fetch::{Fetcher, ProgressCallback, TransferProgress};
use crate::app::models::{
    is_formatted_version, AcquiredInstallation, AcquisitionRequest, InstallationOrigin,
    LocalInstallation, SourceKind,
};
use crate::app::progress::{Phase, ProgressAggregator, ProgressSink};
use crate::app::resolver;
use crate::app::stager::{self, ExtractProgress};
use crate::app::status::{StatusReporter, StatusSink};
use crate::app::vendor::{check_vendor, VendorCheck, VendorProbe, VersionInfoProbe};
use crate::config::AppConfig;
use crate::constants::distribution;
use crate::errors::{AcquireError, AcquireResult, FetchError, FetchResult};

pub use state::{TransactionContext, TransactionState};

/// Acquisition engine bound to one configuration
///
/// Assumes at most one acquisition per installation directory runs at a
/// time; callers serialise concurrent requests for the same key.
pub struct InstallationTransaction {
    config: Arc<AppConfig>,
    probe: Arc<dyn VendorProbe>,
    status: StatusReporter,
    progress_sink: Arc<dyn ProgressSink>,
    cancel: CancellationFlag,
}

impl InstallationTransaction {
    /// Create a transaction with the default vendor probe and silent sinks
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            probe: Arc::new(VersionInfoProbe),
            status: StatusReporter::silent(),
            progress_sink: Arc::new(|_: f64| {}),
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn VendorProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status = StatusReporter::new(sink);
        self
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress_sink = sink;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Installation directory and marker path for a request
    ///
    /// The formatted version must be a digit string so that the directory
    /// name cannot leave `local_root`.
    pub fn local_installation(&self, request: &AcquisitionRequest) -> AcquireResult<LocalInstallation> {
        let version = request.formatted_version();
        if !is_formatted_version(version) {
            return Err(AcquireError::InvalidVersion {
                version: version.to_string(),
            });
        }

        let directory_name = self
            .config
            .local_dir_name(request.app_type(), request.formatted_version())
            .ok_or_else(|| AcquireError::UnknownApplicationType {
                app_type: request.app_type().to_string(),
            })?;

        let installation = LocalInstallation::new(
            request.local_root(),
            &directory_name,
            &self.config.settings.marker_executable,
        );
        if installation.directory.parent() != Some(request.local_root()) {
            return Err(AcquireError::InvalidDirectoryName {
                name: directory_name,
            });
        }

        Ok(installation)
    }

    /// Scratch archive path for an installation
    pub fn scratch_archive_path(&self, installation: &LocalInstallation) -> PathBuf {
        self.config.settings.scratch_dir().join(format!(
            "{}.{}",
            installation.directory_name(),
            distribution::SCRATCH_ARCHIVE_EXTENSION
        ))
    }

    /// Run one acquisition to completion or full rollback
    ///
    /// # Errors
    ///
    /// Returns the terminal [`AcquireError`]; by then every path the
    /// transaction created has been removed and progress reset to 0.
    pub async fn acquire(&self, request: &AcquisitionRequest) -> AcquireResult<AcquiredInstallation> {
        let progress = Arc::new(ProgressAggregator::new(
            self.config.progress,
            Arc::clone(&self.progress_sink),
        ));

        let installation = match self.local_installation(request) {
            Ok(installation) => installation,
            Err(e) => {
                self.status.error(e.to_string());
                progress.reset();
                return Err(e);
            }
        };

        let scratch_archive = self.scratch_archive_path(&installation);
        let mut context = TransactionContext::new(request.clone(), installation, scratch_archive);

        info!(
            "Acquiring {} version {} into {}",
            request.app_type(),
            request.formatted_version(),
            context.installation.directory.display()
        );

        match self.run(&mut context, &progress).await {
            Ok(acquired) => Ok(acquired),
            Err(e) => {
                error!("Acquisition failed ({}): {}", e.reason(), e);
                self.status.error(format!("Acquisition failed: {}", e));
                cleanup::rollback(&context).await;
                progress.reset();
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        context: &mut TransactionContext,
        progress: &Arc<ProgressAggregator>,
    ) -> AcquireResult<AcquiredInstallation> {
        let mut state = TransactionState::CheckLocal;

        loop {
            if let TransactionState::Done(acquired) = state {
                return Ok(acquired);
            }
            self.ensure_not_cancelled()?;
            debug!("Transaction state: {} ({:.0}%)", state, progress.current());

            state = match state {
                TransactionState::CheckLocal => self.check_local(context, progress).await?,
                TransactionState::NeedsAcquire => self.prepare(context).await?,
                TransactionState::Downloading => self.download(context, progress).await?,
                TransactionState::Extracting { source } => {
                    self.extract(context, progress, source).await?
                }
                TransactionState::Staging {
                    source,
                    content_root,
                } => self.stage(context, progress, source, content_root).await?,
                TransactionState::Verifying { source } => {
                    self.verify(context, progress, source).await?
                }
                TransactionState::Committing { source } => {
                    self.commit(context, progress, source).await?
                }
                TransactionState::Done(acquired) => TransactionState::Done(acquired),
            };
        }
    }

    fn ensure_not_cancelled(&self) -> AcquireResult<()> {
        if self.cancel.is_cancelled() {
            Err(AcquireError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn check_local(
        &self,
        context: &mut TransactionContext,
        progress: &ProgressAggregator,
    ) -> AcquireResult<TransactionState> {
        progress.enter(Phase::CheckLocal);
        let installation = &context.installation;
        self.status.info(format!(
            "Checking for local distribution in {}",
            installation.directory.display()
        ));

        if !installation.has_marker().await {
            debug!("No marker at {}", installation.marker_path.display());
            progress.complete_phase();
            return Ok(TransactionState::NeedsAcquire);
        }

        let expected = context.request.vendor();
        let check = check_vendor(Arc::clone(&self.probe), &installation.marker_path, expected).await;
        if !check.is_trusted() {
            if let VendorCheck::Mismatch(found) = &check {
                self.status.warn(format!(
                    "Local distribution is from '{}', expected '{}'; removing it",
                    found, expected
                ));
            }
            cleanup::remove_dir_if_exists(&installation.directory)
                .await
                .map_err(|e| AcquireError::filesystem("removing mismatched installation", e))?;
            progress.complete_phase();
            return Ok(TransactionState::NeedsAcquire);
        }

        if check == VendorCheck::Indeterminate {
            self.status
                .warn("Vendor of the local distribution cannot be determined; using it as is");
        }
        self.status.info(format!(
            "Using existing distribution at {}",
            installation.directory.display()
        ));
        progress.finish();
        Ok(TransactionState::Done(self.outcome(context, InstallationOrigin::Existing)))
    }

    async fn prepare(&self, context: &mut TransactionContext) -> AcquireResult<TransactionState> {
        context.owns_paths = true;
        let directory = context.installation.directory.clone();

        cleanup::remove_dir_if_exists(&directory)
            .await
            .map_err(|e| AcquireError::filesystem("removing stale installation directory", e))?;
        cleanup::remove_file_if_exists(&context.scratch_archive)
            .await
            .map_err(|e| AcquireError::filesystem("removing stale scratch archive", e))?;

        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| AcquireError::filesystem("creating installation directory", e))?;
        if let Some(parent) = context.scratch_archive.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AcquireError::filesystem("creating scratch directory", e))?;
        }

        debug!("Prepared {}", directory.display());
        Ok(TransactionState::Downloading)
    }

    async fn download(
        &self,
        context: &mut TransactionContext,
        progress: &Arc<ProgressAggregator>,
    ) -> AcquireResult<TransactionState> {
        progress.enter(Phase::Download);

        let sources = self.config.sources.enabled_in_priority();
        if sources.is_empty() {
            self.status.error("No download source is enabled");
            return Err(AcquireError::AllSourcesExhausted { attempted: vec![] });
        }

        let mut attempted = Vec::with_capacity(sources.len());
        for kind in sources {
            self.ensure_not_cancelled()?;
            attempted.push(kind);

            cleanup::remove_file_if_exists(&context.scratch_archive)
                .await
                .map_err(|e| AcquireError::filesystem("removing partial scratch archive", e))?;

            match self.attempt(kind, context, progress).await {
                Ok(bytes) => {
                    debug!("{} source delivered {} bytes", kind, bytes);
                    progress.complete_phase();
                    return Ok(TransactionState::Extracting { source: kind });
                }
                Err(e) if e.is_source_failure() => {
                    self.status.warn(format!("Source {} failed: {}", kind, e));
                }
                Err(e) => return Err(local_fetch_failure(e)),
            }
        }

        cleanup::remove_file_if_exists(&context.scratch_archive)
            .await
            .map_err(|e| AcquireError::filesystem("removing partial scratch archive", e))?;
        Err(AcquireError::AllSourcesExhausted { attempted })
    }

    async fn attempt(
        &self,
        kind: SourceKind,
        context: &TransactionContext,
        progress: &Arc<ProgressAggregator>,
    ) -> FetchResult<u64> {
        let location = resolver::resolve(&self.config.sources, kind, &context.request)?;
        self.status
            .info(format!("Downloading {} from {}", location.file_name(), location));

        let fetcher = Fetcher::for_kind(kind, &self.config)?;
        let aggregator = Arc::clone(progress);
        let callback: ProgressCallback = Arc::new(move |transfer: TransferProgress| {
            if let Some(fraction) = transfer.fraction() {
                aggregator.advance(fraction);
            }
        });

        fetcher
            .fetch(&location, &context.scratch_archive, callback)
            .await
    }

    async fn extract(
        &self,
        context: &mut TransactionContext,
        progress: &Arc<ProgressAggregator>,
        source: SourceKind,
    ) -> AcquireResult<TransactionState> {
        progress.enter(Phase::Extract);
        self.status.info("Extracting archive");

        let aggregator = Arc::clone(progress);
        let on_progress: ExtractProgress = Arc::new(move |fraction: f64| aggregator.advance(fraction));
        let content_root = stager::unpack(
            &context.scratch_archive,
            &context.scratch_extract_dir(),
            &self.config.settings.marker_executable,
            on_progress,
        )
        .await?;

        progress.complete_phase();
        Ok(TransactionState::Staging {
            source,
            content_root,
        })
    }

    async fn stage(
        &self,
        context: &mut TransactionContext,
        progress: &ProgressAggregator,
        source: SourceKind,
        content_root: PathBuf,
    ) -> AcquireResult<TransactionState> {
        progress.enter(Phase::Stage);
        self.status.info("Moving files into the installation directory");

        let staging_error = |path: PathBuf| move |cause| AcquireError::Staging { path, cause };

        let mut items = Vec::new();
        let mut entries = tokio::fs::read_dir(&content_root)
            .await
            .map_err(staging_error(content_root.clone()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(staging_error(content_root.clone()))?
        {
            items.push(entry.path());
        }

        let directory = &context.installation.directory;
        let total = items.len();
        for (index, item) in items.into_iter().enumerate() {
            let Some(name) = item.file_name() else {
                continue;
            };
            let target = directory.join(name);
            tokio::fs::rename(&item, &target)
                .await
                .map_err(staging_error(item.clone()))?;
            progress.advance((index + 1) as f64 / total as f64);
        }

        debug!("Moved {} items from {}", total, content_root.display());
        progress.complete_phase();
        Ok(TransactionState::Verifying { source })
    }

    async fn verify(
        &self,
        context: &mut TransactionContext,
        progress: &ProgressAggregator,
        source: SourceKind,
    ) -> AcquireResult<TransactionState> {
        progress.enter(Phase::Verify);
        let installation = &context.installation;

        if !installation.has_marker().await {
            return Err(AcquireError::PostMoveMarkerMissing {
                path: installation.marker_path.clone(),
            });
        }

        let expected = context.request.vendor();
        match check_vendor(Arc::clone(&self.probe), &installation.marker_path, expected).await {
            VendorCheck::Mismatch(found) => {
                return Err(AcquireError::VendorMismatch {
                    expected: expected.to_string(),
                    found,
                })
            }
            VendorCheck::Match(found) => debug!("Vendor verified: {}", found),
            VendorCheck::Indeterminate => self
                .status
                .warn("Vendor of the downloaded distribution cannot be determined"),
        }

        progress.advance(0.5);
        Ok(TransactionState::Committing { source })
    }

    async fn commit(
        &self,
        context: &mut TransactionContext,
        progress: &ProgressAggregator,
        source: SourceKind,
    ) -> AcquireResult<TransactionState> {
        cleanup::remove_dir_if_exists(&context.scratch_extract_dir())
            .await
            .map_err(|e| AcquireError::filesystem("removing scratch extraction directory", e))?;
        if let Err(e) = cleanup::remove_file_if_exists(&context.scratch_archive).await {
            self.status.warn(format!(
                "Could not remove scratch archive {}: {}",
                context.scratch_archive.display(),
                e
            ));
        }

        progress.finish();
        self.status.info(format!(
            "Distribution ready at {}",
            context.installation.directory.display()
        ));
        Ok(TransactionState::Done(
            self.outcome(context, InstallationOrigin::Downloaded { source }),
        ))
    }

    fn outcome(&self, context: &TransactionContext, origin: InstallationOrigin) -> AcquiredInstallation {
        AcquiredInstallation {
            installation: context.installation.clone(),
            origin,
            elapsed: context.started.elapsed(),
            completed_at: Utc::now(),
        }
    }
}

/// Map a fetch failure on the local side to a terminal error
fn local_fetch_failure(err: FetchError) -> AcquireError {
    match err {
        FetchError::Destination { cause, .. } => {
            AcquireError::filesystem("writing scratch archive", cause)
        }
        other => AcquireError::filesystem(
            "fetching archive",
            std::io::Error::other(other.to_string()),
        ),
    }
}

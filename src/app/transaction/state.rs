//! Transaction states and the context carried between them

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use crate::app::models::{AcquiredInstallation, AcquisitionRequest, LocalInstallation, SourceKind};

/// Position of an acquisition in its lifecycle
///
/// Terminal failure is not a state here: every step returns
/// `Err(AcquireError)` instead, and the transaction rolls back.
#[derive(Debug)]
pub enum TransactionState {
    CheckLocal,
    NeedsAcquire,
    Downloading,
    Extracting { source: SourceKind },
    Staging { source: SourceKind, content_root: PathBuf },
    Verifying { source: SourceKind },
    Committing { source: SourceKind },
    Done(AcquiredInstallation),
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::CheckLocal => "check_local",
            TransactionState::NeedsAcquire => "needs_acquire",
            TransactionState::Downloading => "downloading",
            TransactionState::Extracting { .. } => "extracting",
            TransactionState::Staging { .. } => "staging",
            TransactionState::Verifying { .. } => "verifying",
            TransactionState::Committing { .. } => "committing",
            TransactionState::Done(_) => "done",
        };
        f.write_str(name)
    }
}

/// Owned record threaded through every step of one acquisition
#[derive(Debug)]
pub struct TransactionContext {
    pub request: AcquisitionRequest,
    pub installation: LocalInstallation,
    /// Where the winning source writes the archive
    pub scratch_archive: PathBuf,
    /// Set once the transaction has taken ownership of the installation
    /// directory and scratch paths; rollback only touches them afterwards
    pub owns_paths: bool,
    pub started: Instant,
}

impl TransactionContext {
    pub fn new(request: AcquisitionRequest, installation: LocalInstallation, scratch_archive: PathBuf) -> Self {
        Self {
            request,
            installation,
            scratch_archive,
            owns_paths: false,
            started: Instant::now(),
        }
    }

    pub fn scratch_extract_dir(&self) -> PathBuf {
        self.installation.scratch_extract_dir()
    }
}

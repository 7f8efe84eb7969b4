//! Filesystem removal helpers and best-effort rollback

use std::io;
use std::path::Path;

use tracing::{debug, warn};

use super::state::TransactionContext;

/// Remove a directory tree; a missing directory is not an error
pub async fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!("Removed directory {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Remove a file; a missing file is not an error
pub async fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed file {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Undo everything the transaction created
///
/// Removes the scratch extraction directory, the scratch archive and the
/// installation directory. Failures are logged and otherwise ignored. Does
/// nothing before the transaction owns its paths, so a pre-existing
/// installation is never touched.
pub async fn rollback(context: &TransactionContext) {
    if !context.owns_paths {
        debug!("Nothing to roll back");
        return;
    }

    let extract_dir = context.scratch_extract_dir();
    if let Err(e) = remove_dir_if_exists(&extract_dir).await {
        warn!("Rollback could not remove {}: {}", extract_dir.display(), e);
    }
    if let Err(e) = remove_file_if_exists(&context.scratch_archive).await {
        warn!(
            "Rollback could not remove {}: {}",
            context.scratch_archive.display(),
            e
        );
    }
    let directory = &context.installation.directory;
    if let Err(e) = remove_dir_if_exists(directory).await {
        warn!("Rollback could not remove {}: {}", directory.display(), e);
    }
}

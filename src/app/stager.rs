//! Archive extraction and content root discovery
//!
//! Distribution archives are not consistent about layout: some hold the
//! files at the top level, others wrap them in one or more folders. After a
//! full extraction the content root is the shallowest directory that holds
//! the marker executable.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::errors::{StageError, StageResult};

/// Callback receiving the extracted fraction in 0-1
pub type ExtractProgress = Arc<dyn Fn(f64) + Send + Sync>;

/// Extract `archive` into `destination` on the blocking pool and locate the
/// content root
pub async fn unpack(
    archive: &Path,
    destination: &Path,
    marker: &str,
    on_progress: ExtractProgress,
) -> StageResult<PathBuf> {
    let archive = archive.to_path_buf();
    let destination = destination.to_path_buf();
    let marker = marker.to_string();

    tokio::task::spawn_blocking(move || {
        extract_and_locate(&archive, &destination, &marker, on_progress.as_ref())
    })
    .await
    .map_err(|e| StageError::Task(e.to_string()))?
}

/// Extract every entry of `archive` into `destination`, then find the
/// directory holding `marker`
///
/// Progress is reported as entries processed over total entries. Entries
/// whose names would escape `destination` are skipped.
///
/// # Errors
///
/// * `StageError::ArchiveCorrupt` if the archive cannot be opened or an
///   entry cannot be decoded
/// * `StageError::ContentNotFound` if no extracted directory holds `marker`
/// * `StageError::Io` if writing the extracted files fails
pub fn extract_and_locate(
    archive: &Path,
    destination: &Path,
    marker: &str,
    on_progress: &dyn Fn(f64),
) -> StageResult<PathBuf> {
    let corrupt = |reason: String| StageError::ArchiveCorrupt {
        archive: archive.to_path_buf(),
        reason,
    };

    let file = File::open(archive).map_err(|e| corrupt(e.to_string()))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;

    fs::create_dir_all(destination)?;

    let total = zip.len();
    debug!("Extracting {} entries from {}", total, archive.display());
    if total == 0 {
        on_progress(1.0);
    }

    for index in 0..total {
        let mut entry = zip.by_index(index).map_err(|e| corrupt(e.to_string()))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping archive entry with unsafe path: {}", entry.name());
            on_progress((index + 1) as f64 / total as f64);
            continue;
        };
        let out_path = destination.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out_file = File::create(&out_path)?;
            io::copy(&mut entry, &mut out_file).map_err(|e| match e.kind() {
                io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                    corrupt(format!("{}: {}", entry.name(), e))
                }
                _ => StageError::Io(e),
            })?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))?;
            }
        }

        on_progress((index + 1) as f64 / total as f64);
    }

    locate_content_root(destination, marker).ok_or_else(|| StageError::ContentNotFound {
        archive: archive.to_path_buf(),
        marker: marker.to_string(),
    })
}

/// Shallowest directory under `root` holding a regular file named `marker`
pub fn locate_content_root(root: &Path, marker: &str) -> Option<PathBuf> {
    let found = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == marker)
        .min_by_key(|entry| entry.depth())?;

    let content_root = found.path().parent()?.to_path_buf();
    debug!("Content root: {}", content_root.display());
    Some(content_root)
}

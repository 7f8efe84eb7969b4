//! File share transport
//!
//! The location is a path on a mounted or UNC share and is copied in large
//! chunks to bound memory use.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use super::{ProgressCallback, TransferProgress};
use crate::app::models::SourceKind;
use crate::constants::transfer;
use crate::errors::{FetchError, FetchResult};

/// Chunked copy from a share path
#[derive(Debug, Clone)]
pub struct ShareFetcher {
    chunk_size: usize,
}

impl Default for ShareFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ShareFetcher {
    pub fn new() -> Self {
        Self {
            chunk_size: transfer::SHARE_CHUNK_SIZE,
        }
    }

    pub async fn fetch(
        &self,
        source: &Path,
        destination: &Path,
        progress: ProgressCallback,
    ) -> FetchResult<u64> {
        let metadata = tokio::fs::metadata(source).await.map_err(|e| {
            FetchError::unavailable(
                SourceKind::Share,
                format!("{} is not accessible: {}", source.display(), e),
            )
        })?;
        if !metadata.is_file() {
            return Err(FetchError::unavailable(
                SourceKind::Share,
                format!("{} is not a file", source.display()),
            ));
        }

        let total = metadata.len();
        debug!("Copying {} ({} bytes) from share", source.display(), total);

        let mut reader = File::open(source).await.map_err(|e| {
            FetchError::unavailable(
                SourceKind::Share,
                format!("cannot open {}: {}", source.display(), e),
            )
        })?;
        let destination_error = |cause| FetchError::Destination {
            path: destination.to_path_buf(),
            cause,
        };
        let mut writer = File::create(destination).await.map_err(destination_error)?;

        let mut buffer = vec![0u8; self.chunk_size];
        let mut copied: u64 = 0;
        progress(TransferProgress::new(0, Some(total)));

        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            writer
                .write_all(&buffer[..read])
                .await
                .map_err(destination_error)?;
            copied += read as u64;
            progress(TransferProgress::new(copied, Some(total.max(copied))));
        }

        writer.flush().await.map_err(destination_error)?;
        Ok(copied)
    }
}

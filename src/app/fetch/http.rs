//! Streaming HTTP transport

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::{ProgressCallback, TransferProgress};
use crate::app::models::SourceKind;
use crate::constants::transfer;
use crate::errors::{FetchError, FetchResult};

/// Streaming GET into a local file
///
/// The configured timeout bounds connecting, waiting for the response head
/// and every gap between body chunks, not the whole transfer.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            timeout,
        })
    }

    pub async fn fetch(
        &self,
        url: &Url,
        destination: &Path,
        progress: ProgressCallback,
    ) -> FetchResult<u64> {
        let mut response = tokio::time::timeout(self.timeout, self.client.get(url.clone()).send())
            .await
            .map_err(|_| self.timed_out(url))??;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let total = response.content_length();
        debug!("GET {} -> {} ({:?} bytes)", url, status, total);

        let destination_error = |cause| FetchError::Destination {
            path: destination.to_path_buf(),
            cause,
        };
        let mut file = File::create(destination).await.map_err(destination_error)?;

        let mut transferred: u64 = 0;
        progress(TransferProgress::new(0, total));

        while let Some(chunk) = tokio::time::timeout(self.timeout, response.chunk())
            .await
            .map_err(|_| self.timed_out(url))??
        {
            file.write_all(&chunk).await.map_err(destination_error)?;
            transferred += chunk.len() as u64;
            progress(TransferProgress::new(
                transferred,
                total.map(|total| total.max(transferred)),
            ));
        }

        file.flush().await.map_err(destination_error)?;
        Ok(transferred)
    }

    fn timed_out(&self, url: &Url) -> FetchError {
        FetchError::unavailable(
            SourceKind::Http,
            format!("{} timed out after {:?}", url, self.timeout),
        )
    }
}

/// Build the HTTP client used for archive downloads
fn build_http_client(timeout: Duration) -> FetchResult<Client> {
    Client::builder()
        .connect_timeout(timeout.min(transfer::CONNECT_TIMEOUT))
        .user_agent(transfer::USER_AGENT)
        .tcp_nodelay(true)
        .build()
        .map_err(FetchError::Http)
}

//! FTP transport
//!
//! `suppaftp`'s synchronous client runs on the blocking pool. The session
//! logs in, enters the configured directory, descends into the archive's
//! folder when the name carries one, and retrieves the file in binary mode.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tracing::{debug, warn};

use super::{ProgressCallback, TransferProgress};
use crate::app::models::SourceKind;
use crate::app::resolver::FtpTarget;
use crate::constants::transfer;
use crate::errors::{FetchError, FetchResult};

/// Binary FTP retrieval
#[derive(Debug, Clone)]
pub struct FtpFetcher {
    connect_timeout: Duration,
    read_timeout: Duration,
    chunk_size: usize,
}

impl Default for FtpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FtpFetcher {
    pub fn new() -> Self {
        Self {
            connect_timeout: transfer::CONNECT_TIMEOUT,
            read_timeout: transfer::FTP_READ_TIMEOUT,
            chunk_size: transfer::FTP_CHUNK_SIZE,
        }
    }

    /// Override how long a stalled control or data connection is waited on
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub async fn fetch(
        &self,
        target: &FtpTarget,
        destination: &Path,
        progress: ProgressCallback,
    ) -> FetchResult<u64> {
        let target = target.clone();
        let destination = destination.to_path_buf();
        let fetcher = self.clone();

        tokio::task::spawn_blocking(move || fetcher.fetch_blocking(&target, &destination, progress))
            .await
            .map_err(|e| FetchError::Task(e.to_string()))?
    }

    fn fetch_blocking(
        &self,
        target: &FtpTarget,
        destination: &Path,
        progress: ProgressCallback,
    ) -> FetchResult<u64> {
        let address = resolve_address(&target.host, target.port)?;
        debug!("Connecting to FTP server {} ({})", target.host, address);

        let cannot_connect = |reason: String| {
            FetchError::unavailable(
                SourceKind::Ftp,
                format!("cannot connect to {}:{}: {}", target.host, target.port, reason),
            )
        };
        let stream = TcpStream::connect_timeout(&address, self.connect_timeout)
            .map_err(|e| cannot_connect(e.to_string()))?;
        apply_timeouts(&stream, self.read_timeout).map_err(|e| cannot_connect(e.to_string()))?;
        let mut ftp =
            FtpStream::connect_with_stream(stream).map_err(|e| cannot_connect(e.to_string()))?;

        let result = self.retrieve(&mut ftp, target, destination, progress);

        if let Err(e) = ftp.quit() {
            debug!("FTP quit failed: {}", e);
        }
        result
    }

    fn retrieve(
        &self,
        ftp: &mut FtpStream,
        target: &FtpTarget,
        destination: &Path,
        progress: ProgressCallback,
    ) -> FetchResult<u64> {
        ftp.login(target.username.as_str(), target.password.as_str())
            .map_err(|e| FetchError::unavailable(SourceKind::Ftp, format!("login failed: {}", e)))?;

        ftp.cwd(target.directory.as_str()).map_err(|e| {
            FetchError::unavailable(
                SourceKind::Ftp,
                format!("cannot enter {}: {}", target.directory, e),
            )
        })?;
        if let Some(subdirectory) = &target.subdirectory {
            ftp.cwd(subdirectory.as_str()).map_err(|e| {
                FetchError::unavailable(
                    SourceKind::Ftp,
                    format!("cannot enter {}: {}", subdirectory, e),
                )
            })?;
        }

        ftp.transfer_type(FileType::Binary)?;

        let total = match ftp.size(target.file_name.as_str()) {
            Ok(size) => Some(size as u64),
            Err(e) => {
                warn!("FTP server did not report size of {}: {}", target.file_name, e);
                None
            }
        };

        let mut reader = ftp.retr_as_stream(target.file_name.as_str()).map_err(|e| {
            FetchError::unavailable(
                SourceKind::Ftp,
                format!("cannot retrieve {}: {}", target.remote_path(), e),
            )
        })?;
        apply_timeouts(reader.get_ref(), self.read_timeout)?;

        let destination_error = |cause| FetchError::Destination {
            path: PathBuf::from(destination),
            cause,
        };
        let mut file = File::create(destination).map_err(destination_error)?;

        let mut buffer = vec![0u8; self.chunk_size];
        let mut transferred: u64 = 0;
        progress(TransferProgress::new(0, total));

        loop {
            let read = reader.read(&mut buffer).map_err(|e| match e.kind() {
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FetchError::unavailable(
                    SourceKind::Ftp,
                    format!("transfer of {} stalled: {}", target.remote_path(), e),
                ),
                _ => FetchError::Io(e),
            })?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read]).map_err(destination_error)?;
            transferred += read as u64;
            progress(TransferProgress::new(
                transferred,
                total.map(|total| total.max(transferred)),
            ));
        }
        file.flush().map_err(destination_error)?;

        ftp.finalize_retr_stream(reader)?;
        Ok(transferred)
    }
}

fn apply_timeouts(stream: &TcpStream, timeout: Duration) -> io::Result<()> {
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))
}

fn resolve_address(host: &str, port: u16) -> FetchResult<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| {
            FetchError::unavailable(SourceKind::Ftp, format!("cannot resolve {}: {}", host, e))
        })?
        .next()
        .ok_or_else(|| {
            FetchError::unavailable(SourceKind::Ftp, format!("{} has no addresses", host))
        })
}

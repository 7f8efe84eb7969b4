//! Signal handling for cooperative cancellation
//!
//! Ctrl-C and SIGTERM set the acquisition's [`CancellationFlag`]; the
//! transaction notices it at the next phase or source boundary and rolls
//! back before returning.

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::app::cancel::CancellationFlag;

/// Signal handler bound to one cancellation flag
pub struct SignalHandler {
    cancel: CancellationFlag,
}

impl SignalHandler {
    pub fn new(cancel: CancellationFlag) -> Self {
        Self { cancel }
    }

    /// Spawn the background task that waits for Ctrl-C or SIGTERM
    ///
    /// Abort the returned handle once the acquisition has finished.
    pub fn setup(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                match signal::ctrl_c().await {
                    Ok(()) => info!("Ctrl+C signal received"),
                    Err(e) => {
                        warn!("Failed to install Ctrl+C handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                        info!("SIGTERM signal received");
                    }
                    Err(e) => {
                        warn!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {},
                _ = terminate => {},
            }

            eprintln!("Cancelling, cleaning up partial files...");
            cancel.cancel();
        })
    }
}

//! Human-readable status messages for the caller
//!
//! Every message handed to the caller's sink is mirrored to `tracing` at the
//! matching level.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

/// Severity attached to a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Receives status messages
pub trait StatusSink: Send + Sync {
    fn status(&self, message: &str, severity: Severity);
}

impl<F> StatusSink for F
where
    F: Fn(&str, Severity) + Send + Sync,
{
    fn status(&self, message: &str, severity: Severity) {
        self(message, severity)
    }
}

/// Sink that discards every message
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentStatus;

impl StatusSink for SilentStatus {
    fn status(&self, _message: &str, _severity: Severity) {}
}

/// Cloneable handle used by the pipeline components
#[derive(Clone)]
pub struct StatusReporter {
    sink: Arc<dyn StatusSink>,
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter").finish_non_exhaustive()
    }
}

impl StatusReporter {
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self { sink }
    }

    /// Reporter that only logs
    pub fn silent() -> Self {
        Self::new(Arc::new(SilentStatus))
    }

    pub fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{}", message);
        self.sink.status(message, Severity::Info);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!("{}", message);
        self.sink.status(message, Severity::Warning);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        error!("{}", message);
        self.sink.status(message, Severity::Error);
    }
}

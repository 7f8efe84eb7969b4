//! Terminal progress display for acquisitions
//!
//! Renders the aggregated 0-100 progress with an `indicatif` bar when stderr
//! is a terminal, and prints status messages above it. Without a terminal
//! the bar is skipped and status messages go straight to stderr.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};

use crate::app::progress::ProgressSink;
use crate::app::status::{Severity, StatusSink};
use crate::errors::{AppError, Result};

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable the visual progress bar
    pub enable_progress_bar: bool,
    /// Suppress informational status lines
    pub quiet: bool,
    /// Enable terminal colors
    pub enable_colors: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bar: true,
            quiet: false,
            enable_colors: true,
        }
    }
}

/// Progress bar plus status printer for one acquisition
#[derive(Debug, Clone)]
pub struct ProgressDisplay {
    config: ProgressConfig,
    bar: Option<ProgressBar>,
}

impl ProgressDisplay {
    /// Create a display; the bar only appears when stderr is a terminal
    pub fn new(config: ProgressConfig) -> Result<Self> {
        let is_terminal = atty::is(atty::Stream::Stderr);
        let bar = if config.enable_progress_bar && is_terminal && !config.quiet {
            Some(Self::create_bar(config.enable_colors)?)
        } else {
            None
        };

        Ok(Self { config, bar })
    }

    fn create_bar(colors: bool) -> Result<ProgressBar> {
        let template = if colors {
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}"
        } else {
            "{spinner} [{elapsed_precise}] [{bar:40}] {pos:>3}% {msg}"
        };

        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(template)
                .map_err(|e| AppError::generic(format!("Progress bar template error: {}", e)))?
                .progress_chars("##-"),
        );
        Ok(bar)
    }

    pub fn is_visual(&self) -> bool {
        self.bar.is_some()
    }

    /// Sink receiving absolute percentages from the aggregator
    pub fn progress_sink(&self) -> Arc<dyn ProgressSink> {
        let bar = self.bar.clone();
        Arc::new(move |percent: f64| {
            if let Some(bar) = &bar {
                bar.set_position(percent.clamp(0.0, 100.0).round() as u64);
            }
        })
    }

    /// Sink printing status messages above the bar
    pub fn status_sink(&self) -> Arc<dyn StatusSink> {
        let bar = self.bar.clone();
        let quiet = self.config.quiet;
        Arc::new(move |message: &str, severity: Severity| {
            let Some(line) = format_status(message, severity, quiet) else {
                return;
            };
            match &bar {
                Some(bar) => {
                    if severity == Severity::Info {
                        bar.set_message(message.to_string());
                    } else {
                        bar.println(line);
                    }
                }
                None => eprintln!("{}", line),
            }
        })
    }

    /// Finish the bar, leaving it on screen
    pub fn finish(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.to_string());
        }
    }

    /// Remove the bar after a failure
    pub fn abandon(&self) {
        if let Some(bar) = &self.bar {
            bar.abandon();
        }
    }
}

/// Render a status line, or `None` when quiet mode hides it
fn format_status(message: &str, severity: Severity, quiet: bool) -> Option<String> {
    match severity {
        Severity::Info if quiet => None,
        Severity::Info => Some(format!("   {}", message)),
        Severity::Warning => Some(format!("⚠️  {}", message)),
        Severity::Error => Some(format!("❌ {}", message)),
    }
}

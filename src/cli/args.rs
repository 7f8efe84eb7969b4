//! Command-line argument parsing for BackOffice Fetcher
//!
//! This module defines the CLI structure using clap derive macros: acquiring
//! a distribution, previewing where each source would look for it, managing
//! the configuration file and formatting version strings.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::models::{format_version, is_formatted_version, ApplicationType};

/// BackOffice Fetcher - acquire BackOffice client distributions
#[derive(Parser, Debug)]
#[command(
    name = "backoffice_fetcher",
    version,
    about = "Locate, fetch, verify and stage BackOffice client distributions",
    long_about = "Checks for a verified local copy of a BackOffice distribution and otherwise fetches it
from the configured share, HTTP and FTP sources in priority order, falling back automatically
when a source fails. Partially staged installations are always rolled back."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Acquire a distribution, reusing a verified local copy when present
    Fetch(FetchArgs),

    /// Show where each enabled source would look, without fetching
    Resolve(ResolveArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Print the formatted form of a dotted version
    VersionFormat {
        /// Dotted version such as 8.8.7012.0
        #[arg(value_name = "DOTTED")]
        version: String,
    },
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Application type, e.g. "iikoRMS" or "SyrveChain"
    #[arg(short, long)]
    pub app_type: String,

    /// Dotted version (8.8.7012.0) or an already formatted one (887)
    #[arg(long, value_name = "VERSION")]
    pub version: String,

    /// Expected vendor; defaults to the vendor implied by the application type
    #[arg(long)]
    pub vendor: Option<String>,

    /// Override the local installer root from the configuration
    #[arg(long, value_name = "DIR")]
    pub installer_root: Option<PathBuf>,

    /// Prompt for the FTP password instead of reading it from the configuration
    #[arg(long)]
    pub ask_ftp_password: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the resolve command
#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Application type, e.g. "iikoRMS"
    #[arg(short, long)]
    pub app_type: String,

    /// Dotted or formatted version
    #[arg(long, value_name = "VERSION")]
    pub version: String,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Print the configuration file path
    Path,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Logging level requested on the command line, if any
    ///
    /// `None` means the `[logging] level` from the configuration applies.
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

/// Accept either a dotted version or a formatted digit string
fn normalize_version(version: &str) -> String {
    let version = version.trim();
    if is_formatted_version(version) {
        version.to_string()
    } else {
        format_version(version)
    }
}

impl FetchArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.app_type.trim().is_empty() {
            return Err("Application type must not be empty".to_string());
        }

        let version = self.formatted_version();
        if version.is_empty() {
            return Err("Version must not be empty".to_string());
        }
        if !is_formatted_version(&version) {
            return Err(format!("Version '{}' contains no usable digits", self.version));
        }

        if let Some(vendor) = &self.vendor {
            if vendor.trim().is_empty() {
                return Err("Vendor must not be empty when given".to_string());
            }
        }

        Ok(())
    }

    pub fn formatted_version(&self) -> String {
        normalize_version(&self.version)
    }

    pub fn application_type(&self) -> ApplicationType {
        ApplicationType::new(self.app_type.trim())
    }

    /// Expected vendor, falling back to the one implied by the application type
    pub fn vendor(&self) -> String {
        match &self.vendor {
            Some(vendor) => vendor.trim().to_string(),
            None => self.application_type().implied_vendor().to_string(),
        }
    }
}

impl ResolveArgs {
    pub fn formatted_version(&self) -> String {
        normalize_version(&self.version)
    }

    pub fn application_type(&self) -> ApplicationType {
        ApplicationType::new(self.app_type.trim())
    }
}

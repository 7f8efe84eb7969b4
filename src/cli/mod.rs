//! Command-line interface components
//!
//! This module contains CLI-specific code for the BackOffice Fetcher
//! application, including argument parsing, progress display and signal
//! handling.

pub mod args;
pub mod commands;
pub mod progress;
pub mod signals;

pub use args::{Cli, Commands, ConfigAction, ConfigArgs, FetchArgs, GlobalArgs, ResolveArgs};
pub use commands::{handle_config, handle_fetch, handle_resolve, handle_version_format};
pub use progress::{ProgressConfig, ProgressDisplay};
pub use signals::SignalHandler;

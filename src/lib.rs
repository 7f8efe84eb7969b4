//! BackOffice Fetcher Library
//!
//! A Rust library for acquiring versioned BackOffice client distributions.
//! Checks for a verified local copy first, then tries the configured share,
//! HTTP and FTP sources in priority order, unpacks the winning archive and
//! commits or rolls back the installation directory as a single transaction.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

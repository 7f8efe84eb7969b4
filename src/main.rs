//! BackOffice Fetcher CLI application
//!
//! Command-line interface for acquiring BackOffice client distributions from
//! share, HTTP and FTP sources with automatic fallback.

use std::fs::OpenOptions;
use std::process;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, EnvFilter};

// Import CLI modules through the library
use backoffice_fetcher::cli::{
    handle_config, handle_fetch, handle_resolve, handle_version_format, Cli, Commands,
};
use backoffice_fetcher::config::{AppConfig, LoggingConfig};
use backoffice_fetcher::errors::{AppError, Result};

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // Commands that talk to sources need a configuration; create one on first run
    let config = match &cli.command {
        Commands::Fetch(_) | Commands::Resolve(_) => Some(load_config(&cli).await?),
        Commands::Config(_) | Commands::VersionFormat { .. } => None,
    };

    let default_logging = LoggingConfig::default();
    init_logging(&cli, config.as_ref().map_or(&default_logging, |c| &c.logging))?;

    info!("BackOffice Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    let quiet = cli.global.quiet;
    let config_override = cli.global.config.clone();
    match (cli.command, config) {
        (Commands::Fetch(args), Some(config)) => {
            info!("Executing fetch command");
            handle_fetch(args, config, quiet).await
        }
        (Commands::Resolve(args), Some(config)) => {
            info!("Executing resolve command");
            handle_resolve(args, config).await
        }
        (Commands::Config(args), _) => {
            info!("Executing config command");
            handle_config(args, config_override).await
        }
        (Commands::VersionFormat { version }, _) => handle_version_format(&version),
        (_, None) => Err(AppError::generic("Configuration was not loaded")),
    }
}

/// Load the configuration, writing the default file on first run
async fn load_config(cli: &Cli) -> Result<AppConfig> {
    if cli.global.config.is_none() && AppConfig::find_config_file().await?.is_none() {
        AppConfig::initialize_first_run().await?;
    }
    AppConfig::load(cli.global.config.clone()).await
}

/// Initialize logging from CLI verbosity, falling back to the configured level
///
/// With `file_logging` enabled every event is also appended to the log file.
fn init_logging(cli: &Cli, logging: &LoggingConfig) -> Result<()> {
    let level = match cli.log_level() {
        Some(level) => level.to_string().to_lowercase(),
        None => logging.level.to_lowercase(),
    };

    let directive: Directive = format!("backoffice_fetcher={}", level)
        .parse()
        .map_err(|e| AppError::generic(format!("Invalid log level '{}': {}", level, e)))?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    let (writer, ansi) = if logging.file_logging {
        let path = logging.log_file_path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                AppError::generic(format!("Failed to open log file {}: {}", path.display(), e))
            })?;
        (BoxMakeWriter::new(std::io::stderr.and(Mutex::new(file))), false)
    } else {
        (BoxMakeWriter::new(std::io::stderr), logging.colored_output)
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .with_level(cli.global.very_verbose || logging.file_logging)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
    if logging.file_logging {
        info!("Logging to {}", logging.log_file_path().display());
    }

    Ok(())
}

//! Command handlers for BackOffice Fetcher CLI
//!
//! This module implements the command handlers that connect CLI arguments
//! to the acquisition engine and the configuration layer.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::app::{
    format_version, resolve, AcquisitionRequest, CancellationFlag, InstallationOrigin,
    InstallationTransaction,
};
use crate::cli::{
    ConfigAction, ConfigArgs, FetchArgs, ProgressConfig, ProgressDisplay, ResolveArgs,
    SignalHandler,
};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Handle the fetch command
///
/// Runs one acquisition with a terminal progress display, wiring Ctrl-C and
/// SIGTERM into cooperative cancellation.
pub async fn handle_fetch(args: FetchArgs, mut config: AppConfig, quiet: bool) -> Result<()> {
    args.validate().map_err(AppError::generic)?;

    if let Some(root) = &args.installer_root {
        info!("Installer root overridden: {}", root.display());
        config.settings.installer_root = root.clone();
    }

    if args.ask_ftp_password {
        let password = rpassword::prompt_password("FTP password: ")
            .map_err(|e| AppError::generic(format!("Failed to read FTP password: {}", e)))?;
        config.sources.ftp.password = password;
    }

    config.validate()?;

    let request = AcquisitionRequest::new(
        args.application_type(),
        args.formatted_version(),
        args.vendor(),
        config.settings.installer_root.clone(),
    );
    info!(
        "Acquiring {} version {} (vendor {}) under {}",
        request.app_type(),
        request.formatted_version(),
        request.vendor(),
        request.local_root().display()
    );

    let display = ProgressDisplay::new(ProgressConfig {
        enable_progress_bar: !args.json,
        quiet: quiet || args.json,
        enable_colors: config.logging.colored_output,
    })?;

    let cancel = CancellationFlag::new();
    let signal_task = SignalHandler::new(cancel.clone()).setup();

    let transaction = InstallationTransaction::new(Arc::new(config))
        .with_progress_sink(display.progress_sink())
        .with_status_sink(display.status_sink())
        .with_cancellation(cancel);

    let result = transaction.acquire(&request).await;
    signal_task.abort();

    match result {
        Ok(acquired) => {
            display.finish("done");
            if args.json {
                let json = serde_json::to_string_pretty(&acquired)
                    .map_err(|e| AppError::generic(format!("Failed to render JSON: {}", e)))?;
                println!("{}", json);
            } else {
                match &acquired.origin {
                    InstallationOrigin::Existing => {
                        println!("✅ Using existing distribution: {}", acquired.directory().display())
                    }
                    InstallationOrigin::Downloaded { source } => println!(
                        "✅ Distribution from {} ready in {:.1}s: {}",
                        source,
                        acquired.elapsed.as_secs_f64(),
                        acquired.directory().display()
                    ),
                }
            }
            Ok(())
        }
        Err(e) => {
            display.abandon();
            error!("Acquisition failed ({}): {}", e.reason(), e);
            if args.json {
                let json = serde_json::json!({ "error": e.reason(), "message": e.to_string() });
                println!("{}", json);
            }
            Err(e.into())
        }
    }
}

/// Handle the resolve command
///
/// Prints where every enabled source would look for the archive, in
/// priority order, without contacting any of them.
pub async fn handle_resolve(args: ResolveArgs, config: AppConfig) -> Result<()> {
    let request = AcquisitionRequest::new(
        args.application_type(),
        args.formatted_version(),
        args.application_type().implied_vendor(),
        config.settings.installer_root.clone(),
    );

    println!(
        "🔍 {} version {}",
        request.app_type(),
        request.formatted_version()
    );

    match config.local_dir_name(request.app_type(), request.formatted_version()) {
        Some(name) => println!(
            "   local: {}",
            config.settings.installer_root.join(name).display()
        ),
        None => println!("   local: no directory name configured for this application type"),
    }

    let sources = config.sources.enabled_in_priority();
    if sources.is_empty() {
        println!("   No download source is enabled");
        return Ok(());
    }

    for kind in sources {
        match resolve(&config.sources, kind, &request) {
            Ok(location) => println!("   {:<5} {}", kind, location),
            Err(e) => println!("   {:<5} ⚠️  {}", kind, e),
        }
    }

    Ok(())
}

/// Handle configuration management commands
pub async fn handle_config(args: ConfigArgs, config_override: Option<PathBuf>) -> Result<()> {
    match args.action {
        ConfigAction::Init { force } => {
            let path = match config_override {
                Some(path) => path,
                None => AppConfig::get_default_config_path()?,
            };
            if path.exists() && !force {
                println!(
                    "✅ Configuration already exists at {}. Use --force to overwrite.",
                    path.display()
                );
                return Ok(());
            }
            AppConfig::write_default_config(&path).await?;
            println!("📁 Wrote default configuration to {}", path.display());
        }
        ConfigAction::Show => {
            let config = AppConfig::load(config_override).await?;
            print!("{}", config.to_toml_string()?);
        }
        ConfigAction::Path => {
            let path = match config_override {
                Some(path) => Some(path),
                None => AppConfig::find_config_file().await?,
            };
            match path {
                Some(path) => println!("{}", path.display()),
                None => {
                    debug!("No configuration file found, showing default location");
                    println!("{} (not created yet)", AppConfig::get_default_config_path()?.display());
                }
            }
        }
    }

    Ok(())
}

/// Handle the version-format command
pub fn handle_version_format(version: &str) -> Result<()> {
    let formatted = format_version(version);
    if formatted.is_empty() {
        return Err(AppError::generic("Version must not be empty"));
    }
    println!("{}", formatted);
    Ok(())
}

//! Source location resolution
//!
//! Turns an acquisition request plus a configured source into the concrete
//! remote location of the archive: a path on a file share, an HTTP URL, or
//! an FTP host/directory/file triple. Archive name templates may carry a
//! leading folder (e.g. `Syrve/RMSSOffice{version}.zip`) which selects a
//! vendor-specific subdirectory below the source's base location.

use std::fmt;
use std::path::PathBuf;

use tracing::debug;
use url::Url;

use crate::app::models::{AcquisitionRequest, SourceKind};
use crate::config::SourcesConfig;
use crate::constants::distribution::VERSION_PLACEHOLDER;
use crate::errors::{FetchError, FetchResult};

/// FTP coordinates of an archive
#[derive(Clone, PartialEq, Eq)]
pub struct FtpTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Configured base directory
    pub directory: String,
    /// Folder from the archive name template, entered after `directory`
    pub subdirectory: Option<String>,
    pub file_name: String,
}

impl fmt::Debug for FtpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("directory", &self.directory)
            .field("subdirectory", &self.subdirectory)
            .field("file_name", &self.file_name)
            .finish()
    }
}

impl FtpTarget {
    /// Full remote path of the archive
    pub fn remote_path(&self) -> String {
        let mut path = self.directory.trim_end_matches('/').to_string();
        if let Some(sub) = &self.subdirectory {
            path.push('/');
            path.push_str(sub);
        }
        path.push('/');
        path.push_str(&self.file_name);
        path
    }
}

/// Transport-specific address of an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationTarget {
    Share(PathBuf),
    Http(Url),
    Ftp(FtpTarget),
}

/// Concrete location of an archive for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLocation {
    pub kind: SourceKind,
    /// Archive name after template expansion, `/`-separated
    pub archive_name: String,
    pub target: LocationTarget,
}

impl ResolvedLocation {
    /// File name of the archive without any folder prefix
    pub fn file_name(&self) -> &str {
        self.archive_name
            .rsplit('/')
            .next()
            .unwrap_or(&self.archive_name)
    }
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            LocationTarget::Share(path) => write!(f, "{}", path.display()),
            LocationTarget::Http(url) => write!(f, "{}", url),
            LocationTarget::Ftp(ftp) => {
                write!(f, "ftp://{}:{}{}", ftp.host, ftp.port, ftp.remote_path())
            }
        }
    }
}

/// Substitute the formatted version into an archive name template
pub fn expand_template(template: &str, formatted_version: &str) -> String {
    template.replace(VERSION_PLACEHOLDER, formatted_version)
}

/// Normalise an expanded archive name into `/`-separated components
fn archive_components(kind: SourceKind, archive_name: &str) -> FetchResult<Vec<String>> {
    let components: Vec<String> = archive_name
        .replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .map(str::to_string)
        .collect();

    if components.is_empty() {
        return Err(FetchError::misconfigured(kind, "archive name template expands to an empty name"));
    }
    if components.iter().any(|part| part == "..") {
        return Err(FetchError::misconfigured(
            kind,
            format!("archive name '{}' must not contain '..'", archive_name),
        ));
    }
    Ok(components)
}

fn required<'a>(kind: SourceKind, value: Option<&'a str>, field: &str) -> FetchResult<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| FetchError::misconfigured(kind, format!("no {} configured", field)))
}

/// Resolve where `kind` keeps the archive for `request`
///
/// # Errors
///
/// Returns `FetchError::Misconfigured` when the source has no template for
/// the application type, no base location, or an unusable archive name.
pub fn resolve(
    sources: &SourcesConfig,
    kind: SourceKind,
    request: &AcquisitionRequest,
) -> FetchResult<ResolvedLocation> {
    let template = sources
        .archive_template(kind, request.app_type())
        .ok_or_else(|| {
            FetchError::misconfigured(
                kind,
                format!("no archive name template for application type '{}'", request.app_type()),
            )
        })?;

    if !template.contains(VERSION_PLACEHOLDER) {
        debug!(
            "Archive template '{}' for {} has no {} placeholder",
            template, kind, VERSION_PLACEHOLDER
        );
    }

    let expanded = expand_template(template, request.formatted_version());
    let components = archive_components(kind, &expanded)?;
    let archive_name = components.join("/");

    let target = match kind {
        SourceKind::Share => {
            let base = sources
                .share
                .path
                .as_ref()
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or_else(|| FetchError::misconfigured(kind, "no share path configured"))?;
            let mut path = base.clone();
            for part in &components {
                path.push(part);
            }
            LocationTarget::Share(path)
        }
        SourceKind::Http => {
            let base = required(kind, sources.http.url.as_deref(), "base URL")?;
            let base = if base.ends_with('/') {
                base.to_string()
            } else {
                format!("{}/", base)
            };
            let base = Url::parse(&base).map_err(|e| {
                FetchError::misconfigured(kind, format!("invalid base URL '{}': {}", base, e))
            })?;
            let url = base.join(&archive_name).map_err(|e| {
                FetchError::misconfigured(kind, format!("cannot join '{}' onto {}: {}", archive_name, base, e))
            })?;
            LocationTarget::Http(url)
        }
        SourceKind::Ftp => {
            let ftp = &sources.ftp;
            let host = required(kind, ftp.host.as_deref(), "host")?;
            let directory = required(kind, ftp.directory.as_deref(), "directory")?;
            let (subdirectory, file_name) = match archive_name.rsplit_once('/') {
                Some((dir, file)) => (Some(dir.to_string()), file.to_string()),
                None => (None, archive_name.clone()),
            };
            LocationTarget::Ftp(FtpTarget {
                host: host.to_string(),
                port: ftp.port,
                username: ftp.username.clone(),
                password: ftp.password.clone(),
                directory: directory.to_string(),
                subdirectory,
                file_name,
            })
        }
    };

    let location = ResolvedLocation {
        kind,
        archive_name,
        target,
    };
    debug!("Resolved {} source location: {}", kind, location);
    Ok(location)
}

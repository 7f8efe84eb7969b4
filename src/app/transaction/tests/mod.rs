//! Scenario tests for the installation transaction
//!
//! Sources are a temporary directory standing in for the file share and a
//! `wiremock` server for HTTP. FTP is only exercised against a closed port.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::app::stager::tests::write_zip;
use crate::app::status::Severity;
use crate::app::vendor::tests::fake_executable;

const APP_TYPE: &str = "ProductA-Edition1";
const VERSION: &str = "887";
const VENDOR: &str = "AcmeCo";
const ARCHIVE: &str = "ProductA887.zip";
const LOCAL_DIR: &str = "ProductA887";
const MARKER: &str = "BackOffice.exe";

/// Temporary share, local root and scratch directory
pub struct Fixture {
    _temp: TempDir,
    pub share_dir: PathBuf,
    pub local_root: PathBuf,
    pub scratch_dir: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let share_dir = temp.path().join("share");
        let local_root = temp.path().join("distr");
        let scratch_dir = temp.path().join("scratch");
        std::fs::create_dir_all(&share_dir).unwrap();
        Self {
            _temp: temp,
            share_dir,
            local_root,
            scratch_dir,
        }
    }

    /// Configuration with every source disabled
    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.settings.scratch_dir = Some(self.scratch_dir.clone());
        config
            .local_names
            .insert(APP_TYPE.to_string(), "ProductA".to_string());

        config.sources.share.enabled = false;
        config.sources.share.path = Some(self.share_dir.clone());
        config.sources.http.enabled = false;
        config.sources.ftp.enabled = false;
        for names in [
            &mut config.sources.share.archive_names,
            &mut config.sources.http.archive_names,
            &mut config.sources.ftp.archive_names,
        ] {
            names.insert(APP_TYPE.to_string(), "ProductA{version}.zip".to_string());
        }
        config
    }

    pub fn request(&self) -> AcquisitionRequest {
        AcquisitionRequest::new(APP_TYPE, VERSION, VENDOR, &self.local_root)
    }

    pub fn install_dir(&self) -> PathBuf {
        self.local_root.join(LOCAL_DIR)
    }

    pub fn scratch_archive(&self) -> PathBuf {
        self.scratch_dir.join(format!("{}.zip", LOCAL_DIR))
    }

    /// Write a distribution archive to the share
    pub fn share_archive(&self, entries: &[(&str, &[u8])]) -> PathBuf {
        let archive = self.share_dir.join(ARCHIVE);
        write_zip(&archive, entries);
        archive
    }

    /// Build a distribution archive and return its bytes
    pub fn archive_bytes(&self, entries: &[(&str, &[u8])]) -> Vec<u8> {
        let archive = self.share_dir.join("built.zip");
        write_zip(&archive, entries);
        let bytes = std::fs::read(&archive).unwrap();
        std::fs::remove_file(&archive).unwrap();
        bytes
    }

    /// Pre-populate a local installation whose marker reports `company`
    pub fn existing_installation(&self, company: Option<&str>) {
        let dir = self.install_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let marker = match company {
            Some(company) => fake_executable(company),
            None => b"MZ".to_vec(),
        };
        std::fs::write(dir.join(MARKER), marker).unwrap();
        std::fs::write(dir.join("stale.txt"), b"old").unwrap();
    }

    pub fn assert_rolled_back(&self) {
        assert!(!self.install_dir().exists(), "installation directory left behind");
        assert!(!self.scratch_archive().exists(), "scratch archive left behind");
        assert!(!self
            .install_dir()
            .join(distribution::SCRATCH_EXTRACT_DIR)
            .exists());
    }
}

/// Records every progress value and status message
#[derive(Clone, Default)]
pub struct Recorder {
    pub progress: Arc<Mutex<Vec<f64>>>,
    pub status: Arc<Mutex<Vec<(String, Severity)>>>,
}

impl Recorder {
    pub fn attach(&self, transaction: InstallationTransaction) -> InstallationTransaction {
        let progress = Arc::clone(&self.progress);
        let status = Arc::clone(&self.status);
        transaction
            .with_progress_sink(Arc::new(move |percent: f64| {
                progress.lock().unwrap().push(percent)
            }))
            .with_status_sink(Arc::new(move |message: &str, severity: Severity| {
                status.lock().unwrap().push((message.to_string(), severity))
            }))
    }

    pub fn last_progress(&self) -> Option<f64> {
        self.progress.lock().unwrap().last().copied()
    }

    pub fn has_status(&self, needle: &str, severity: Severity) -> bool {
        self.status
            .lock()
            .unwrap()
            .iter()
            .any(|(message, s)| *s == severity && message.contains(needle))
    }
}

const GOOD_ENTRIES: &[(&str, &[u8])] = &[
    ("ProductA887/", b""),
    ("ProductA887/BackOffice.exe", b"MZ"),
    ("ProductA887/lib/core.dll", b"dll"),
    ("ProductA887/config.xml", b"<config/>"),
];

fn transaction(config: AppConfig) -> InstallationTransaction {
    InstallationTransaction::new(Arc::new(config))
}

fn http_source(config: &mut AppConfig, server: &MockServer) {
    config.sources.http.enabled = true;
    config.sources.http.url = Some(format!("{}/distr", server.uri()));
}

fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Serve one HTTP response that promises `declared` bytes, sends `sent`
/// and then drops the connection
async fn truncating_server(declared: usize, sent: usize) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {}\r\n\r\n",
                declared
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&vec![b'P'; sent]).await;
            let _ = socket.flush().await;
        }
    });
    format!("http://{}/distr", address)
}

fn assert_monotonic(values: &[f64]) {
    assert!(
        values.windows(2).all(|pair| pair[0] <= pair[1]),
        "progress went backwards: {:?}",
        values
    );
    assert!(values.iter().all(|v| (0.0..=100.0).contains(v)));
}

#[tokio::test]
async fn test_share_only_acquisition_reaches_100() {
    let fixture = Fixture::new();
    fixture.share_archive(GOOD_ENTRIES);
    let mut config = fixture.config();
    config.sources.share.enabled = true;

    let recorder = Recorder::default();
    let acquired = recorder
        .attach(transaction(config))
        .acquire(&fixture.request())
        .await
        .unwrap();

    assert_eq!(acquired.directory(), fixture.install_dir());
    assert_eq!(
        acquired.origin,
        InstallationOrigin::Downloaded {
            source: SourceKind::Share
        }
    );
    assert!(fixture.install_dir().join(MARKER).is_file());
    assert!(fixture.install_dir().join("lib").join("core.dll").is_file());
    assert!(fixture.install_dir().join("config.xml").is_file());
    assert!(!fixture.install_dir().join("ProductA887").exists(), "move must be flat");
    assert!(!fixture
        .install_dir()
        .join(distribution::SCRATCH_EXTRACT_DIR)
        .exists());
    assert!(!fixture.scratch_archive().exists());

    assert_eq!(recorder.last_progress(), Some(100.0));
    assert_monotonic(&recorder.progress.lock().unwrap());
}

#[tokio::test]
async fn test_existing_installation_with_unknown_vendor_skips_network() {
    let fixture = Fixture::new();
    fixture.existing_installation(None);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = fixture.config();
    http_source(&mut config, &server);

    let recorder = Recorder::default();
    let acquired = recorder
        .attach(transaction(config))
        .acquire(&fixture.request())
        .await
        .unwrap();

    assert_eq!(acquired.origin, InstallationOrigin::Existing);
    assert!(fixture.install_dir().join("stale.txt").exists());
    assert_eq!(recorder.last_progress(), Some(100.0));
    assert!(recorder.has_status("cannot be determined", Severity::Warning));
}

#[tokio::test]
async fn test_existing_installation_with_matching_vendor_is_reused() {
    let fixture = Fixture::new();
    fixture.existing_installation(Some("AcmeCo Software Ltd."));
    let mut config = fixture.config();
    config.sources.share.enabled = true;

    let acquired = transaction(config).acquire(&fixture.request()).await.unwrap();
    assert_eq!(acquired.origin, InstallationOrigin::Existing);
    assert!(fixture.install_dir().join("stale.txt").exists());
}

#[tokio::test]
async fn test_vendor_mismatch_replaces_existing_installation() {
    let fixture = Fixture::new();
    fixture.existing_installation(Some("OtherCorp"));
    fixture.share_archive(GOOD_ENTRIES);
    let mut config = fixture.config();
    config.sources.share.enabled = true;

    let acquired = transaction(config).acquire(&fixture.request()).await.unwrap();

    assert_eq!(
        acquired.origin,
        InstallationOrigin::Downloaded {
            source: SourceKind::Share
        }
    );
    assert!(!fixture.install_dir().join("stale.txt").exists());
    assert!(fixture.install_dir().join("config.xml").exists());
}

#[tokio::test]
async fn test_stale_directory_without_marker_is_replaced() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(fixture.install_dir()).unwrap();
    std::fs::write(fixture.install_dir().join("partial.dll"), b"x").unwrap();
    fixture.share_archive(GOOD_ENTRIES);
    let mut config = fixture.config();
    config.sources.share.enabled = true;

    transaction(config).acquire(&fixture.request()).await.unwrap();
    assert!(!fixture.install_dir().join("partial.dll").exists());
    assert!(fixture.install_dir().join(MARKER).exists());
}

#[tokio::test]
async fn test_later_source_not_attempted_after_success() {
    let fixture = Fixture::new();
    fixture.share_archive(GOOD_ENTRIES);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = fixture.config();
    config.sources.share.enabled = true;
    http_source(&mut config, &server);
    config.sources.order = vec!["share".into(), "http".into()];

    let acquired = transaction(config).acquire(&fixture.request()).await.unwrap();
    assert_eq!(
        acquired.origin,
        InstallationOrigin::Downloaded {
            source: SourceKind::Share
        }
    );
}

#[tokio::test]
async fn test_priority_order_is_respected() {
    let fixture = Fixture::new();
    fixture.share_archive(GOOD_ENTRIES);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/distr/{}", ARCHIVE)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(fixture.archive_bytes(GOOD_ENTRIES)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = fixture.config();
    config.sources.share.enabled = true;
    http_source(&mut config, &server);
    config.sources.order = vec!["http".into(), "share".into()];

    let acquired = transaction(config).acquire(&fixture.request()).await.unwrap();
    assert_eq!(
        acquired.origin,
        InstallationOrigin::Downloaded {
            source: SourceKind::Http
        }
    );
}

#[tokio::test]
async fn test_falls_back_from_share_to_http() {
    let fixture = Fixture::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/distr/{}", ARCHIVE)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(fixture.archive_bytes(GOOD_ENTRIES)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = fixture.config();
    config.sources.share.enabled = true;
    http_source(&mut config, &server);

    let recorder = Recorder::default();
    let acquired = recorder
        .attach(transaction(config))
        .acquire(&fixture.request())
        .await
        .unwrap();

    assert_eq!(
        acquired.origin,
        InstallationOrigin::Downloaded {
            source: SourceKind::Http
        }
    );
    assert!(recorder.has_status("Source share failed", Severity::Warning));
    assert_monotonic(&recorder.progress.lock().unwrap());
}

#[tokio::test]
async fn test_falls_back_across_unreachable_ftp_and_misconfigured_share() {
    let fixture = Fixture::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(fixture.archive_bytes(GOOD_ENTRIES)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = fixture.config();
    config.sources.share.enabled = true;
    config.sources.share.path = None;
    config.sources.ftp.enabled = true;
    config.sources.ftp.host = Some("127.0.0.1".to_string());
    config.sources.ftp.port = closed_port();
    http_source(&mut config, &server);
    config.sources.order = vec!["smb".into(), "ftp".into(), "http".into()];

    let acquired = transaction(config).acquire(&fixture.request()).await.unwrap();
    assert_eq!(
        acquired.origin,
        InstallationOrigin::Downloaded {
            source: SourceKind::Http
        }
    );
}

#[tokio::test]
async fn test_all_sources_disabled_is_exhausted() {
    let fixture = Fixture::new();
    let recorder = Recorder::default();

    let err = recorder
        .attach(transaction(fixture.config()))
        .acquire(&fixture.request())
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::AllSourcesExhausted { ref attempted } if attempted.is_empty()));
    fixture.assert_rolled_back();
    assert_eq!(recorder.last_progress(), Some(0.0));
}

#[tokio::test]
async fn test_http_404_is_exhausted_without_local_directory() {
    let fixture = Fixture::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = fixture.config();
    http_source(&mut config, &server);

    let recorder = Recorder::default();
    let err = recorder
        .attach(transaction(config))
        .acquire(&fixture.request())
        .await
        .unwrap_err();

    match err {
        AcquireError::AllSourcesExhausted { attempted } => {
            assert_eq!(attempted, vec![SourceKind::Http])
        }
        other => panic!("Expected AllSourcesExhausted, got {:?}", other),
    }
    fixture.assert_rolled_back();
    assert_eq!(recorder.last_progress(), Some(0.0));
    assert!(recorder.has_status("Acquisition failed", Severity::Error));
}

#[tokio::test]
async fn test_corrupt_archive_rolls_back() {
    let fixture = Fixture::new();
    std::fs::write(fixture.share_dir.join(ARCHIVE), b"this is not a zip file").unwrap();
    let mut config = fixture.config();
    config.sources.share.enabled = true;

    let err = transaction(config).acquire(&fixture.request()).await.unwrap_err();

    assert!(matches!(err, AcquireError::ArchiveCorrupt { .. }));
    fixture.assert_rolled_back();
}

#[tokio::test]
async fn test_missing_marker_rolls_back() {
    let fixture = Fixture::new();
    fixture.share_archive(&[("ProductA887/Front.exe", b"MZ"), ("ProductA887/lib/a.dll", b"x")]);
    let mut config = fixture.config();
    config.sources.share.enabled = true;

    let recorder = Recorder::default();
    let err = recorder
        .attach(transaction(config))
        .acquire(&fixture.request())
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::ContentNotFound { .. }));
    fixture.assert_rolled_back();
    assert_eq!(recorder.last_progress(), Some(0.0));
}

#[tokio::test]
async fn test_downloaded_vendor_mismatch_rolls_back() {
    let fixture = Fixture::new();
    let marker = fake_executable("OtherCorp");
    fixture.share_archive(&[("pkg/BackOffice.exe", marker.as_slice())]);
    let mut config = fixture.config();
    config.sources.share.enabled = true;

    let err = transaction(config).acquire(&fixture.request()).await.unwrap_err();

    match err {
        AcquireError::VendorMismatch { expected, found } => {
            assert_eq!(expected, VENDOR);
            assert_eq!(found, "OtherCorp");
        }
        other => panic!("Expected VendorMismatch, got {:?}", other),
    }
    fixture.assert_rolled_back();
}

#[tokio::test]
async fn test_downloaded_vendor_match_is_accepted() {
    let fixture = Fixture::new();
    let marker = fake_executable("ACMECO");
    fixture.share_archive(&[("BackOffice.exe", marker.as_slice())]);
    let mut config = fixture.config();
    config.sources.share.enabled = true;

    let acquired = transaction(config).acquire(&fixture.request()).await.unwrap();
    assert!(acquired.installation.marker_path.is_file());
}

#[tokio::test]
async fn test_partial_download_is_replaced_by_next_source() {
    let fixture = Fixture::new();
    fixture.share_archive(GOOD_ENTRIES);

    let mut config = fixture.config();
    config.sources.http.enabled = true;
    config.sources.http.url = Some(truncating_server(1024 * 1024, 4096).await);
    config.sources.share.enabled = true;
    config.sources.order = vec!["http".into(), "share".into()];

    let scratch = fixture.scratch_archive();
    let partial_seen = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&partial_seen);
    let acquired = transaction(config)
        .with_status_sink(Arc::new(move |message: &str, severity: Severity| {
            if severity == Severity::Warning && message.starts_with("Source http failed") {
                *seen.lock().unwrap() = Some(scratch.exists());
            }
        }))
        .acquire(&fixture.request())
        .await
        .unwrap();

    assert_eq!(*partial_seen.lock().unwrap(), Some(true), "http wrote nothing");
    assert_eq!(
        acquired.origin,
        InstallationOrigin::Downloaded {
            source: SourceKind::Share
        }
    );
    assert_eq!(
        std::fs::read(fixture.install_dir().join("config.xml")).unwrap(),
        b"<config/>"
    );
    assert_eq!(
        std::fs::read(fixture.install_dir().join("lib").join("core.dll")).unwrap(),
        b"dll"
    );
    assert!(!fixture.scratch_archive().exists());
}

#[tokio::test]
async fn test_partial_download_from_last_source_is_removed() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.sources.http.enabled = true;
    config.sources.http.url = Some(truncating_server(1024 * 1024, 4096).await);

    let err = transaction(config).acquire(&fixture.request()).await.unwrap_err();

    match err {
        AcquireError::AllSourcesExhausted { attempted } => {
            assert_eq!(attempted, vec![SourceKind::Http])
        }
        other => panic!("Expected AllSourcesExhausted, got {:?}", other),
    }
    fixture.assert_rolled_back();
}

#[tokio::test]
async fn test_non_digit_version_never_touches_siblings() {
    let fixture = Fixture::new();
    let victim = fixture.local_root.join("user_data");
    std::fs::create_dir_all(&victim).unwrap();
    std::fs::write(victim.join("important.txt"), b"keep").unwrap();

    let recorder = Recorder::default();
    let request = AcquisitionRequest::new(APP_TYPE, "/../user_data", VENDOR, &fixture.local_root);
    let err = recorder
        .attach(transaction(fixture.config()))
        .acquire(&request)
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::InvalidVersion { .. }));
    assert_eq!(err.reason(), "invalid_version");
    assert!(victim.join("important.txt").is_file());
    assert_eq!(recorder.last_progress(), Some(0.0));
}

#[test]
fn test_local_installation_rejects_unsafe_names() {
    let fixture = Fixture::new();
    let transaction = transaction(fixture.config());

    for version in ["", "8.8.7", "../887", "887/.."] {
        let request = AcquisitionRequest::new(APP_TYPE, version, VENDOR, &fixture.local_root);
        assert!(
            matches!(
                transaction.local_installation(&request),
                Err(AcquireError::InvalidVersion { .. })
            ),
            "version {:?} accepted",
            version
        );
    }

    let mut config = fixture.config();
    config
        .local_names
        .insert(APP_TYPE.to_string(), "../ProductA".to_string());
    let err = InstallationTransaction::new(Arc::new(config))
        .local_installation(&fixture.request())
        .unwrap_err();
    assert!(matches!(err, AcquireError::InvalidDirectoryName { .. }));
}

#[tokio::test]
async fn test_unknown_application_type() {
    let fixture = Fixture::new();
    let request = AcquisitionRequest::new("Nonexistent", VERSION, VENDOR, &fixture.local_root);

    let err = transaction(fixture.config()).acquire(&request).await.unwrap_err();
    assert_eq!(err.reason(), "unknown_application_type");
    assert!(!fixture.local_root.exists());
}

#[tokio::test]
async fn test_cancelled_before_start_leaves_existing_installation() {
    let fixture = Fixture::new();
    fixture.existing_installation(Some("OtherCorp"));
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let err = transaction(fixture.config())
        .with_cancellation(cancel)
        .acquire(&fixture.request())
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::Cancelled));
    assert!(fixture.install_dir().join("stale.txt").exists());
}

#[tokio::test]
async fn test_cancelled_mid_acquisition_rolls_back() {
    let fixture = Fixture::new();
    fixture.share_archive(GOOD_ENTRIES);
    let mut config = fixture.config();
    config.sources.share.enabled = true;

    let cancel = CancellationFlag::new();
    let trigger = cancel.clone();
    let err = transaction(config)
        .with_cancellation(cancel)
        .with_status_sink(Arc::new(move |message: &str, _severity: Severity| {
            if message.starts_with("Extracting") {
                trigger.cancel();
            }
        }))
        .acquire(&fixture.request())
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::Cancelled));
    fixture.assert_rolled_back();
}

#[tokio::test]
async fn test_progress_stays_within_phase_windows() {
    let fixture = Fixture::new();
    fixture.share_archive(GOOD_ENTRIES);
    let mut config = fixture.config();
    config.sources.share.enabled = true;
    let plan = config.progress;

    let recorder = Recorder::default();
    recorder
        .attach(transaction(config))
        .acquire(&fixture.request())
        .await
        .unwrap();

    let values = recorder.progress.lock().unwrap();
    assert_monotonic(&values);
    assert_eq!(values.first().copied(), Some(plan.check_local.lower));
    assert!(values.contains(&plan.download.upper));
    assert!(values.contains(&plan.extract.upper));
    assert!(values.contains(&plan.stage.upper));
}

#[test]
fn test_scratch_archive_path_uses_local_dir_name() {
    let fixture = Fixture::new();
    let transaction = transaction(fixture.config());
    let installation = transaction.local_installation(&fixture.request()).unwrap();
    assert_eq!(installation.directory, fixture.install_dir());
    assert_eq!(transaction.scratch_archive_path(&installation), fixture.scratch_archive());
}

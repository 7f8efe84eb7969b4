//! Integration tests for the acquisition engine
//!
//! These tests drive `InstallationTransaction` through the public API with a
//! configuration file loaded from disk, a temporary directory standing in for
//! the file share and a `wiremock` server for the HTTP source.


use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use backoffice_fetcher::app::{
    resolve, AcquisitionRequest, CancellationFlag, InstallationOrigin, InstallationTransaction,
    ResolvedLocation, SourceKind,
};
use backoffice_fetcher::config::AppConfig;
use backoffice_fetcher::errors::AcquireError;

use support::*;

fn request(workspace: &Workspace) -> AcquisitionRequest {
    AcquisitionRequest::new(APP_TYPE, VERSION, VENDOR, &workspace.installer_root)
}

fn engine(config: AppConfig, probe: Arc<FixedProbe>, events: &Events) -> InstallationTransaction {
    InstallationTransaction::new(Arc::new(config))
        .with_probe(probe)
        .with_progress_sink(events.progress_sink())
        .with_status_sink(events.status_sink())
}

#[tokio::test]
async fn test_share_acquisition_from_config_file() {
    let workspace = Workspace::new();
    write_zip(&workspace.share_dir.join("ProductA887.zip"), DISTRIBUTION);
    let config = workspace.load_config(&["share"], true, None).await;

    let events = Events::default();
    let probe = FixedProbe::new(Some("AcmeCo Software Ltd."));
    let acquired = engine(config, Arc::clone(&probe), &events)
        .acquire(&request(&workspace))
        .await
        .unwrap();

    let install_dir = workspace.install_dir();
    assert_eq!(acquired.directory(), install_dir);
    assert_eq!(acquired.installation.marker_path, install_dir.join(MARKER));
    assert_eq!(
        acquired.origin,
        InstallationOrigin::Downloaded {
            source: SourceKind::Share
        }
    );

    // Only the content root is moved, flattened into the installation directory
    assert!(install_dir.join(MARKER).is_file());
    assert!(install_dir.join("Resources/strings.xml").is_file());
    assert!(!install_dir.join("readme.txt").exists());
    assert!(!install_dir.join("temp_extract_folder").exists());
    assert!(!workspace.scratch_archive().exists());

    assert_eq!(probe.call_count(), 1);
    assert_eq!(events.progress().last().copied(), Some(100.0));
}

#[tokio::test]
async fn test_second_run_reuses_installation_without_network() {
    let workspace = Workspace::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/distr/ProductA887.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes(DISTRIBUTION)))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/distr", server.uri());
    let config = workspace.load_config(&["http"], false, Some(&url)).await;
    let probe = FixedProbe::new(None);

    let first = engine(config.clone(), Arc::clone(&probe), &Events::default())
        .acquire(&request(&workspace))
        .await
        .unwrap();
    assert_eq!(
        first.origin,
        InstallationOrigin::Downloaded {
            source: SourceKind::Http
        }
    );

    let events = Events::default();
    let second = engine(config, probe, &events)
        .acquire(&request(&workspace))
        .await
        .unwrap();
    assert_eq!(second.origin, InstallationOrigin::Existing);
    assert_eq!(second.directory(), first.directory());
    assert_eq!(events.progress().last().copied(), Some(100.0));
    assert!(events
        .warnings()
        .iter()
        .any(|w| w.contains("cannot be determined")));
}

#[tokio::test]
async fn test_falls_back_to_http_when_share_lacks_archive() {
    let workspace = Workspace::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/distr/ProductA887.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes(DISTRIBUTION)))
        .mount(&server)
        .await;

    let url = format!("{}/distr", server.uri());
    let config = workspace
        .load_config(&["smb", "http", "ftp"], true, Some(&url))
        .await;

    let events = Events::default();
    let acquired = engine(config, FixedProbe::new(Some(VENDOR)), &events)
        .acquire(&request(&workspace))
        .await
        .unwrap();

    assert_eq!(
        acquired.origin,
        InstallationOrigin::Downloaded {
            source: SourceKind::Http
        }
    );
    assert!(events.warnings().iter().any(|w| w.contains("share")));
    assert!(acquired.directory().join(MARKER).is_file());
}

#[tokio::test]
async fn test_all_sources_fail_leaves_nothing_behind() {
    let workspace = Workspace::new();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/distr", server.uri());
    let config = workspace.load_config(&["share", "http"], false, Some(&url)).await;

    let events = Events::default();
    let err = engine(config, FixedProbe::new(Some(VENDOR)), &events)
        .acquire(&request(&workspace))
        .await
        .unwrap_err();

    match err {
        AcquireError::AllSourcesExhausted { attempted } => {
            assert_eq!(attempted, vec![SourceKind::Http]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    workspace.assert_clean_failure();
    assert_eq!(events.progress().last().copied(), Some(0.0));
}

#[tokio::test]
async fn test_downloaded_vendor_mismatch_rolls_back() {
    let workspace = Workspace::new();
    write_zip(&workspace.share_dir.join("ProductA887.zip"), DISTRIBUTION);
    let config = workspace.load_config(&["share"], true, None).await;

    let err = engine(config, FixedProbe::new(Some("Other Corp")), &Events::default())
        .acquire(&request(&workspace))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AcquireError::VendorMismatch { ref expected, ref found }
            if expected == VENDOR && found == "Other Corp"
    ));
    assert_eq!(err.reason(), "vendor_mismatch");
    workspace.assert_clean_failure();
}

#[tokio::test]
async fn test_archive_without_marker_rolls_back() {
    let workspace = Workspace::new();
    write_zip(
        &workspace.share_dir.join("ProductA887.zip"),
        &[("docs/", b""), ("docs/manual.pdf", b"%PDF")],
    );
    let config = workspace.load_config(&["share"], true, None).await;

    let err = engine(config, FixedProbe::new(Some(VENDOR)), &Events::default())
        .acquire(&request(&workspace))
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::ContentNotFound { .. }));
    workspace.assert_clean_failure();
}

#[tokio::test]
async fn test_cancelled_acquisition_keeps_existing_copy() {
    let workspace = Workspace::new();
    std::fs::create_dir_all(workspace.install_dir()).unwrap();
    std::fs::write(workspace.install_dir().join("partial.bin"), b"x").unwrap();
    let config = workspace.load_config(&["share"], true, None).await;

    let cancel = CancellationFlag::new();
    cancel.cancel();
    let err = engine(config, FixedProbe::new(None), &Events::default())
        .with_cancellation(cancel)
        .acquire(&request(&workspace))
        .await
        .unwrap_err();

    assert!(matches!(err, AcquireError::Cancelled));
    assert!(workspace.install_dir().join("partial.bin").exists());
}

#[tokio::test]
async fn test_outcome_serializes_to_json() {
    let workspace = Workspace::new();
    write_zip(&workspace.share_dir.join("ProductA887.zip"), DISTRIBUTION);
    let config = workspace.load_config(&["share"], true, None).await;

    let acquired = engine(config, FixedProbe::new(None), &Events::default())
        .acquire(&request(&workspace))
        .await
        .unwrap();

    let json: serde_json::Value = serde_json::to_value(&acquired).unwrap();
    assert_eq!(json["origin"]["kind"], "downloaded");
    assert_eq!(json["origin"]["source"], "share");
    assert!(json["directory"].as_str().unwrap().ends_with(LOCAL_DIR));
}

#[tokio::test]
async fn test_resolve_matches_configured_sources() {
    let workspace = Workspace::new();
    let config = workspace
        .load_config(&["http", "share"], true, Some("https://distr.example.com/base"))
        .await;
    let request = request(&workspace);

    let locations: Vec<ResolvedLocation> = config
        .sources
        .enabled_in_priority()
        .into_iter()
        .map(|kind| resolve(&config.sources, kind, &request).unwrap())
        .collect();

    assert_eq!(locations.len(), 2);
    assert_eq!(
        locations[0].to_string(),
        "https://distr.example.com/base/ProductA887.zip"
    );
    assert_eq!(locations[1].kind, SourceKind::Share);
    assert_eq!(locations[1].file_name(), "ProductA887.zip");
}

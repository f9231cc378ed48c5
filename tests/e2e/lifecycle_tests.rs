//! Full update lifecycle runs against a mock feed.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::harness::{ARCH, PLATFORM};
use super::{collect_events, start_truncating_feed, TestFeed};
use saorsa_autoupdate::{
    create_event_channel, Error, UpdateEvent, UpdateOrchestrator, UpdateOutcome, UpdatePhase,
};
use serde_json::json;

/// Test 1: A newer release is downloaded and promoted to its final name.
#[tokio::test]
async fn test_new_release_is_downloaded() {
    let feed = TestFeed::start().await;
    feed.mount_manifest("1.1.0", "app.zip").await;
    feed.mount_payload("app.zip", vec![42u8; 8 * 1024], 1).await;

    let config = feed.config("1.0.0");
    let (tx, mut rx) = create_event_channel();
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap().with_events(tx);

    let outcome = orchestrator.start().await;
    let UpdateOutcome::UpdateAvailable { version, artifact } = outcome else {
        panic!("expected update-available, got {outcome:?}");
    };
    assert_eq!(version.as_str(), "1.1.0");

    let (temp, final_path) = feed.artifact_paths("1.1.0");
    assert_eq!(artifact, final_path);
    assert!(!temp.exists());
    assert_eq!(std::fs::read(&final_path).unwrap(), vec![42u8; 8 * 1024]);
    assert_eq!(orchestrator.phase(), UpdatePhase::UpdateAvailable);

    let events = collect_events(&mut rx);
    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(
        terminal,
        vec![&UpdateEvent::UpdateAvailable {
            version: "1.1.0".to_string()
        }]
    );
    assert!(events
        .iter()
        .any(|e| matches!(e, UpdateEvent::DownloadProgress { downloaded, .. } if *downloaded == 8 * 1024)));
}

/// Test 2: Equal versions stop at up-to-date without touching the disk.
#[tokio::test]
async fn test_equal_version_is_up_to_date() {
    let feed = TestFeed::start().await;
    feed.mount_manifest("1.1.0", "app.zip").await;
    feed.mount_payload("app.zip", b"never".to_vec(), 0).await;

    let config = feed.config("1.1.0");
    let (tx, mut rx) = create_event_channel();
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap().with_events(tx);

    assert!(matches!(orchestrator.start().await, UpdateOutcome::UpToDate));
    assert_eq!(collect_events(&mut rx), vec![UpdateEvent::UpToDate]);
    assert!(!feed.temp_dir().exists());
}

/// Test 3: A running version newer than the feed is also up to date.
#[tokio::test]
async fn test_newer_running_version_is_up_to_date() {
    let feed = TestFeed::start().await;
    feed.mount_manifest("1.1.0", "app.zip").await;
    feed.mount_payload("app.zip", b"never".to_vec(), 0).await;

    let config = feed.config("2.0.0-beta.1");
    let (tx, mut rx) = create_event_channel();
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap().with_events(tx);

    assert!(matches!(orchestrator.start().await, UpdateOutcome::UpToDate));
    assert_eq!(collect_events(&mut rx), vec![UpdateEvent::UpToDate]);
    assert!(!feed.temp_dir().exists());
}

/// Test 4: A prerelease of the advertised version is upgraded to the release.
#[tokio::test]
async fn test_prerelease_upgrades_to_release() {
    let feed = TestFeed::start().await;
    feed.mount_manifest("1.1.0", "app.zip").await;
    feed.mount_payload("app.zip", b"release".to_vec(), 1).await;

    let config = feed.config("1.1.0-rc.2");
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap();

    assert!(matches!(
        orchestrator.start().await,
        UpdateOutcome::UpdateAvailable { .. }
    ));
}

/// Test 5: The manifest request carries a cache-busting parameter.
#[tokio::test]
async fn test_manifest_request_is_cache_busted() {
    let feed = TestFeed::start().await;
    feed.mount_manifest("1.0.0", "app.zip").await;

    let config = feed.config("1.0.0");
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap();
    orchestrator.start().await;

    let requests = feed.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let url = &requests[0].url;
    assert_eq!(url.path(), format!("/{PLATFORM}/{ARCH}/latest.json"));
    assert!(
        url.query_pairs().any(|(key, value)| key == "ts" && value.parse::<i64>().is_ok()),
        "missing cache-busting parameter in {url}"
    );
}

/// Test 6: A stale partial download is replaced by a fresh one.
#[tokio::test]
async fn test_stale_partial_download_is_replaced() {
    let feed = TestFeed::start().await;
    feed.mount_manifest("1.1.0", "app.zip").await;
    feed.mount_payload("app.zip", b"fresh payload".to_vec(), 1).await;

    let stale = feed.write_temp_file(".update.zip", b"stale partial bytes that are longer");

    let config = feed.config("1.0.0");
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap();
    assert!(matches!(
        orchestrator.start().await,
        UpdateOutcome::UpdateAvailable { .. }
    ));

    let (_, final_path) = feed.artifact_paths("1.1.0");
    assert!(!stale.exists());
    assert_eq!(std::fs::read(final_path).unwrap(), b"fresh payload");
}

/// Test 7: A server error on the payload fails the run without a final artifact.
#[tokio::test]
async fn test_payload_error_status_fails() {
    let feed = TestFeed::start().await;
    feed.mount_manifest("1.1.0", "app.zip").await;
    feed.mount_payload_status("app.zip", 500).await;

    let config = feed.config("1.0.0");
    let (tx, mut rx) = create_event_channel();
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap().with_events(tx);

    let outcome = orchestrator.start().await;
    match outcome {
        UpdateOutcome::Failed(Error::Download(msg)) => assert!(msg.contains("500"), "{msg}"),
        other => panic!("expected download failure, got {other:?}"),
    }

    let events = collect_events(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], UpdateEvent::Error { kind, .. } if kind == "download"));

    let (_, final_path) = feed.artifact_paths("1.1.0");
    assert!(!final_path.exists());
    assert!(feed.temp_dir().is_dir());
}

/// Test 8: An interrupted stream leaves partial data only at the temp path.
#[tokio::test]
async fn test_interrupted_download_never_exposes_final_artifact() {
    let feed = TestFeed::start().await;
    let base = start_truncating_feed(
        json!({"version": "1.1.0", "src": {"path": "app.zip"}}),
        64 * 1024,
        1024,
    )
    .await;

    let config = feed.config_for("1.0.0", &base);
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap();

    let outcome = orchestrator.start().await;
    assert!(
        matches!(outcome, UpdateOutcome::Failed(Error::Download(_))),
        "expected download failure, got {outcome:?}"
    );

    let (temp, final_path) = feed.artifact_paths("1.1.0");
    assert!(!final_path.exists());
    let partial = std::fs::metadata(&temp).unwrap().len();
    assert!(partial < 64 * 1024);
}

/// Test 9: The next run after an interrupted download starts clean.
#[tokio::test]
async fn test_run_after_interruption_recovers() {
    let feed = TestFeed::start().await;
    feed.mount_manifest("1.1.0", "app.zip").await;
    feed.mount_payload("app.zip", vec![1u8; 2048], 1).await;

    let partial = feed.write_temp_file(".update.zip", &[0xAB; 100]);

    let config = feed.config("1.0.0");
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap();
    assert!(matches!(
        orchestrator.start().await,
        UpdateOutcome::UpdateAvailable { .. }
    ));
    assert!(!partial.exists());
}

/// Test 10: Manifest failures are reported as manifest errors.
#[tokio::test]
async fn test_manifest_not_found_fails() {
    let feed = TestFeed::start().await;
    feed.mount_manifest_status(404).await;

    let config = feed.config("1.0.0");
    let (tx, mut rx) = create_event_channel();
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap().with_events(tx);

    assert!(matches!(
        orchestrator.start().await,
        UpdateOutcome::Failed(Error::Manifest(_))
    ));
    let events = collect_events(&mut rx);
    assert!(matches!(&events[..], [UpdateEvent::Error { kind, .. }] if kind == "manifest"));
    assert!(!feed.temp_dir().exists());
}

/// Test 11: A manifest with a non-string version is invalid input.
#[tokio::test]
async fn test_manifest_with_numeric_version_fails() {
    let feed = TestFeed::start().await;
    feed.mount_manifest_body(json!({"version": 42, "src": {"path": "app.zip"}}))
        .await;

    let config = feed.config("1.0.0");
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap();

    assert!(matches!(
        orchestrator.start().await,
        UpdateOutcome::Failed(Error::InvalidInput(_))
    ));
}

/// Test 12: A manifest without a payload path is a manifest error.
#[tokio::test]
async fn test_manifest_without_path_fails() {
    let feed = TestFeed::start().await;
    feed.mount_manifest_body(json!({"version": "1.1.0"})).await;

    let config = feed.config("1.0.0");
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap();

    assert!(matches!(
        orchestrator.start().await,
        UpdateOutcome::Failed(Error::Manifest(_))
    ));
}

/// Test 13: An existing final artifact skips the download and launches the updater.
#[cfg(unix)]
#[tokio::test]
async fn test_existing_download_goes_straight_to_restart() {
    let feed = TestFeed::start().await;
    feed.mount_manifest("1.1.0", "app.zip").await;
    feed.mount_payload("app.zip", b"never".to_vec(), 0).await;
    feed.install_recording_updater();

    let artifact = feed.write_temp_file("1.1.0.zip", b"complete bundle");

    let config = feed.config("1.0.0");
    let (tx, mut rx) = create_event_channel();
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap().with_events(tx);

    let outcome = orchestrator.start().await;
    let UpdateOutcome::ReadyToRestart { version, updater } = outcome else {
        panic!("expected ready-to-restart, got {outcome:?}");
    };
    assert_eq!(version.as_str(), "1.1.0");
    assert_eq!(updater.binary, feed.temp_dir().join(format!("autoupdater-{ARCH}")));
    assert_eq!(updater.install_dir, feed.install_base());
    assert_eq!(
        collect_events(&mut rx),
        vec![UpdateEvent::ReadyToRestart {
            version: "1.1.0".to_string()
        }]
    );

    let args = feed.recorded_updater_args().await;
    assert_eq!(
        args,
        format!(
            "--bundle {} --inst-dir {} --app-name test-app --wait {}",
            artifact.display(),
            feed.install_base().display(),
            std::process::id()
        )
    );
    assert_eq!(std::fs::read(&artifact).unwrap(), b"complete bundle");
}

/// Test 14: A download followed by a second run hands the bundle to the updater.
#[cfg(unix)]
#[tokio::test]
async fn test_second_run_restarts_with_downloaded_bundle() {
    let feed = TestFeed::start().await;
    feed.mount_manifest("1.1.0", "app.zip").await;
    feed.mount_payload("app.zip", b"bundle".to_vec(), 1).await;
    feed.install_recording_updater();

    let config = feed.config("1.0.0");
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap();

    assert!(matches!(
        orchestrator.start().await,
        UpdateOutcome::UpdateAvailable { .. }
    ));
    assert!(matches!(
        orchestrator.start().await,
        UpdateOutcome::ReadyToRestart { .. }
    ));
    assert_eq!(orchestrator.phase(), UpdatePhase::ReadyToRestart);

    let args = feed.recorded_updater_args().await;
    assert!(args.starts_with("--bundle "), "{args}");
    assert!(args.contains("1.1.0.zip"), "{args}");
}

/// Test 15: A missing updater binary fails the restart handoff.
#[tokio::test]
async fn test_missing_updater_binary_fails() {
    let feed = TestFeed::start().await;
    feed.mount_manifest("1.1.0", "app.zip").await;
    feed.write_temp_file("1.1.0.zip", b"complete bundle");

    let config = feed.config("1.0.0");
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap();

    assert!(matches!(
        orchestrator.start().await,
        UpdateOutcome::Failed(Error::Filesystem { .. })
    ));
}

/// Test 16: A stale download that cannot be removed fails with one error event.
#[tokio::test]
async fn test_unremovable_stale_download_fails() {
    let feed = TestFeed::start().await;
    feed.mount_manifest("1.1.0", "app.zip").await;
    feed.mount_payload("app.zip", b"never".to_vec(), 0).await;

    // A non-empty directory where the partial download belongs.
    let (temp, final_path) = feed.artifact_paths("1.1.0");
    std::fs::create_dir_all(&temp).unwrap();
    std::fs::write(temp.join("leftover"), b"x").unwrap();

    let config = feed.config("1.0.0");
    let (tx, mut rx) = create_event_channel();
    let mut orchestrator = UpdateOrchestrator::new(&config).unwrap().with_events(tx);

    let outcome = orchestrator.start().await;
    match outcome {
        UpdateOutcome::Failed(Error::Filesystem { path, .. }) => assert_eq!(path, temp),
        other => panic!("expected filesystem failure, got {other:?}"),
    }
    assert_eq!(orchestrator.phase(), UpdatePhase::Failed);

    let events = collect_events(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], UpdateEvent::Error { kind, .. } if kind == "filesystem"));
    assert!(!final_path.exists());
}

//! Test harness serving a mock update feed.
//!
//! `TestFeed` couples a `wiremock` server acting as the update feed with a
//! scratch directory holding the updater bundle, the working folder and the
//! install base.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use saorsa_autoupdate::{PackageConfig, UpdateEvent, UpdateEventsChannel};
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Feed platform used by every test.
pub const PLATFORM: &str = "linux";

/// Feed architecture used by every test.
pub const ARCH: &str = "x64";

/// Application executable name used by every test.
pub const APP_NAME: &str = "test-app";

/// A mock update feed plus scratch directories.
pub struct TestFeed {
    /// The mock HTTP server.
    pub server: MockServer,
    dir: TempDir,
}

impl TestFeed {
    /// Start an empty feed.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Package configuration pointing at this feed.
    pub fn config(&self, current_version: &str) -> PackageConfig {
        self.config_for(current_version, &self.server.uri())
    }

    /// Package configuration pointing at an arbitrary feed URL.
    pub fn config_for(&self, current_version: &str, feed_url: &str) -> PackageConfig {
        PackageConfig {
            platform: PLATFORM.to_string(),
            arch: ARCH.to_string(),
            updater_dir: Some(self.dir.path().join("updater")),
            temp_root: Some(self.dir.path().join("tmp")),
            install_base: Some(self.install_base()),
            ..PackageConfig::new(current_version, feed_url, APP_NAME)
        }
    }

    /// Working folder the orchestrator uses.
    pub fn temp_dir(&self) -> PathBuf {
        self.dir.path().join("tmp").join(APP_NAME)
    }

    /// Install base handed to the updater.
    pub fn install_base(&self) -> PathBuf {
        self.dir.path().join("install")
    }

    /// Serve a manifest for `version` pointing at `payload_path`.
    pub async fn mount_manifest(&self, version: &str, payload_path: &str) {
        self.mount_manifest_body(json!({
            "version": version,
            "src": { "path": payload_path }
        }))
        .await;
    }

    /// Serve an arbitrary manifest body.
    pub async fn mount_manifest_body(&self, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/{PLATFORM}/{ARCH}/latest.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Answer the manifest request with `status`.
    pub async fn mount_manifest_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/{PLATFORM}/{ARCH}/latest.json")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Serve `body` at `payload_path`, expecting exactly `hits` requests.
    pub async fn mount_payload(&self, payload_path: &str, body: Vec<u8>, hits: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/{PLATFORM}/{ARCH}/{payload_path}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .expect(hits)
            .mount(&self.server)
            .await;
    }

    /// Answer `payload_path` with `status`.
    pub async fn mount_payload_status(&self, payload_path: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/{PLATFORM}/{ARCH}/{payload_path}")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Install an updater script that records its arguments to `args.txt`
    /// in its working directory.
    #[cfg(unix)]
    pub fn install_recording_updater(&self) {
        let dir = self.dir.path().join("updater").join(PLATFORM);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("autoupdater-{ARCH}")),
            "#!/bin/sh\necho \"$@\" > args.tmp && mv args.tmp args.txt\n",
        )
        .unwrap();
    }

    /// Wait for the recording updater to write its arguments.
    #[cfg(unix)]
    pub async fn recorded_updater_args(&self) -> String {
        let args_file = self.temp_dir().join("args.txt");
        for _ in 0..100 {
            if args_file.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        std::fs::read_to_string(&args_file)
            .unwrap()
            .trim()
            .to_string()
    }

    /// Write a file into the working folder, creating it if needed.
    pub fn write_temp_file(&self, name: &str, contents: &[u8]) -> PathBuf {
        std::fs::create_dir_all(self.temp_dir()).unwrap();
        let path = self.temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Paths of the in-progress and final download for `version`.
    pub fn artifact_paths(&self, version: &str) -> (PathBuf, PathBuf) {
        (
            self.temp_dir().join(".update.zip"),
            self.temp_dir().join(format!("{version}.zip")),
        )
    }
}

/// Drain every event already published on `rx`.
pub fn collect_events(rx: &mut UpdateEventsChannel) -> Vec<UpdateEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Start a raw HTTP feed serving `manifest`, whose payload response
/// announces `announced` bytes but closes the connection after `sent`.
///
/// Returns the feed base URL.
pub async fn start_truncating_feed(
    manifest: serde_json::Value,
    announced: usize,
    sent: usize,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let manifest = manifest.to_string();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let manifest = manifest.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let Ok(n) = socket.read(&mut buf).await else {
                    return;
                };
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let target = request.split_whitespace().nth(1).unwrap_or("");

                if target.contains("latest.json") {
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{manifest}",
                        manifest.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                } else {
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/zip\r\nContent-Length: {announced}\r\nConnection: close\r\n\r\n"
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&vec![0xAB; sent]).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

//! Update manifest retrieval.
//!
//! A channel publishes `latest.json` next to its payloads:
//!
//! ```json
//! { "version": "1.1.0", "src": { "path": "app.zip" } }
//! ```

use crate::error::{Error, Result};
use crate::version::Version;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

/// Query parameter carrying the cache-busting timestamp.
pub const CACHE_BUST_PARAM: &str = "ts";

/// Latest release described by a channel manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Release version.
    pub version: Version,
    /// Payload path relative to the channel URL.
    pub path: String,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    version: Option<serde_json::Value>,
    #[serde(default)]
    src: Option<RawSource>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default)]
    path: Option<String>,
}

impl Manifest {
    /// Build a manifest from its JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Manifest`] if the body is not JSON or a field is
    /// missing, and [`Error::InvalidInput`] if the version is malformed.
    pub fn from_json(body: &str) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(body)
            .map_err(|e| Error::Manifest(format!("invalid manifest body: {e}")))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawManifest) -> Result<Self> {
        let version = raw
            .version
            .ok_or_else(|| Error::Manifest("manifest has no version".to_string()))?;
        let version = Version::from_value(&version)?;

        let path = raw
            .src
            .and_then(|src| src.path)
            .filter(|path| !path.trim().is_empty())
            .ok_or_else(|| Error::Manifest("manifest has no src.path".to_string()))?;

        Ok(Self { version, path })
    }

    /// File name of the completed download for this release.
    #[must_use]
    pub fn artifact_file_name(&self) -> String {
        format!("{}.zip", self.version)
    }
}

/// Fetches channel manifests over HTTP(S).
#[derive(Debug, Clone)]
pub struct ManifestFetcher {
    client: Client,
}

impl ManifestFetcher {
    /// Create a fetcher with its own HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Create a fetcher sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch and parse the manifest at `manifest_url`.
    ///
    /// A timestamp query parameter is appended so intermediate caches never
    /// serve a stale manifest. There is no retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Manifest`] on transport failure, non-success status,
    /// or an unparseable body, and [`Error::InvalidInput`] if the version is
    /// malformed.
    pub async fn fetch(&self, manifest_url: &str) -> Result<Manifest> {
        let url = cache_busted(manifest_url, chrono::Utc::now().timestamp_millis())?;
        debug!("Fetching manifest from {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Manifest(format!("request to {manifest_url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Manifest(format!(
                "{manifest_url} returned HTTP {status}"
            )));
        }

        let raw: RawManifest = response
            .json()
            .await
            .map_err(|e| Error::Manifest(format!("invalid manifest body: {e}")))?;
        Manifest::from_raw(raw)
    }
}

impl Default for ManifestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn cache_busted(manifest_url: &str, timestamp: i64) -> Result<Url> {
    let mut url = Url::parse(manifest_url)
        .map_err(|e| Error::Manifest(format!("invalid manifest URL '{manifest_url}': {e}")))?;
    url.query_pairs_mut()
        .append_pair(CACHE_BUST_PARAM, &timestamp.to_string());
    Ok(url)
}

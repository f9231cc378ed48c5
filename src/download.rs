//! Streaming payload download with atomic promotion.
//!
//! The body is written chunk by chunk to a temporary path and only renamed to
//! its final name once the stream has ended cleanly, so the final path is
//! either absent or complete. A failed download leaves the partial temp file
//! behind; the orchestrator clears it on the next run.

use crate::error::{Error, Result};
use futures::StreamExt;
use reqwest::{Client, Url};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Downloads update payloads to disk.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Create a downloader with its own HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Create a downloader sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Stream `source_url` into `temp_path`, then rename it to `final_path`.
    ///
    /// `on_progress` is called after every chunk with the bytes written so far
    /// and the announced content length, if any. Returns the number of bytes
    /// downloaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Download`] if the URL scheme is not `http`/`https`,
    /// the server answers with a non-success status, the stream or disk write
    /// fails, or the final rename fails.
    pub async fn download<F>(
        &self,
        source_url: &str,
        temp_path: &Path,
        final_path: &Path,
        mut on_progress: F,
    ) -> Result<u64>
    where
        F: FnMut(u64, Option<u64>),
    {
        let url = Url::parse(source_url)
            .map_err(|e| Error::Download(format!("invalid payload URL '{source_url}': {e}")))?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::Download(format!(
                    "unsupported scheme '{other}' in {source_url}"
                )))
            }
        }

        info!("Downloading update from {source_url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Download(format!("request to {source_url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Download(format!("{source_url} returned HTTP {status}")));
        }

        let total = response.content_length();
        let mut file = File::create(temp_path).await.map_err(|e| {
            Error::Download(format!("cannot create {}: {e}", temp_path.display()))
        })?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                Error::Download(format!("stream from {source_url} interrupted: {e}"))
            })?;
            file.write_all(&chunk).await.map_err(|e| {
                Error::Download(format!("write to {} failed: {e}", temp_path.display()))
            })?;
            downloaded += chunk.len() as u64;
            on_progress(downloaded, total);
        }

        file.flush().await.map_err(|e| {
            Error::Download(format!("flush of {} failed: {e}", temp_path.display()))
        })?;
        file.sync_all().await.map_err(|e| {
            Error::Download(format!("sync of {} failed: {e}", temp_path.display()))
        })?;
        drop(file);

        if let Some(expected) = total {
            if expected != downloaded {
                return Err(Error::Download(format!(
                    "{source_url} ended after {downloaded} of {expected} bytes"
                )));
            }
        }

        debug!(
            "Renaming {} to {}",
            temp_path.display(),
            final_path.display()
        );
        tokio::fs::rename(temp_path, final_path)
            .await
            .map_err(|e| {
                Error::Download(format!(
                    "cannot rename {} to {}: {e}",
                    temp_path.display(),
                    final_path.display()
                ))
            })?;

        info!("Update downloaded to {} ({downloaded} bytes)", final_path.display());
        Ok(downloaded)
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

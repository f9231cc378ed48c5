//! Per-run update working state.

use crate::manifest::Manifest;
use std::path::{Path, PathBuf};

/// Name of the in-progress download inside the working folder.
pub const TEMP_DOWNLOAD_NAME: &str = ".update.zip";

/// Paths used by one orchestrator run.
///
/// Computed fresh at the start of every run and never mutated; the final
/// artifact is only known once the manifest has been fetched, see
/// [`UpdateState::with_manifest`]. The files these paths point at are the
/// only state that survives between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateState {
    temp_dir: PathBuf,
    temp_download: PathBuf,
    final_artifact: Option<PathBuf>,
    updater_binary: String,
}

impl UpdateState {
    /// State for a run working in `temp_dir`.
    #[must_use]
    pub fn new(temp_dir: PathBuf, updater_binary: String) -> Self {
        let temp_download = temp_dir.join(TEMP_DOWNLOAD_NAME);
        Self {
            temp_dir,
            temp_download,
            final_artifact: None,
            updater_binary,
        }
    }

    /// The same state with the final artifact named after `manifest`.
    #[must_use]
    pub fn with_manifest(self, manifest: &Manifest) -> Self {
        let final_artifact = self.temp_dir.join(manifest.artifact_file_name());
        Self {
            final_artifact: Some(final_artifact),
            ..self
        }
    }

    /// Working folder.
    #[must_use]
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Path of the in-progress download.
    #[must_use]
    pub fn temp_download(&self) -> &Path {
        &self.temp_download
    }

    /// Path of the completed download, once the manifest is known.
    #[must_use]
    pub fn final_artifact(&self) -> Option<&Path> {
        self.final_artifact.as_deref()
    }

    /// File name of the platform updater binary.
    #[must_use]
    pub fn updater_binary(&self) -> &str {
        &self.updater_binary
    }
}

//! Update lifecycle state machine.
//!
//! ```text
//! Idle -> CheckingManifest -> UpToDate
//!                          -> PreparingUpdate -> CheckingExistingDownload -> ReadyToRestart
//!                                                                         -> Downloading -> UpdateAvailable
//! any -> Failed
//! ```
//!
//! A run either finds the running version current, hands an already
//! downloaded release to the updater, or downloads the latest release for the
//! next run to hand over. Every run ends with exactly one terminal
//! [`UpdateEvent`] and one [`UpdateOutcome`].

use crate::config::PackageConfig;
use crate::download::Downloader;
use crate::error::{Error, Result};
use crate::event::{UpdateEvent, UpdateEventsSender};
use crate::manifest::{Manifest, ManifestFetcher};
use crate::restart::{LaunchedUpdater, PlatformStrategy, RestartLauncher};
use crate::state::UpdateState;
use crate::version::Version;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Phase of the update lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    /// No run has started yet.
    Idle,
    /// Fetching the channel manifest.
    CheckingManifest,
    /// The running version is current.
    UpToDate,
    /// A newer release exists; preparing the working folder.
    PreparingUpdate,
    /// Looking for a completed download from an earlier run.
    CheckingExistingDownload,
    /// The updater has been launched.
    ReadyToRestart,
    /// Streaming the release payload.
    Downloading,
    /// The release has been downloaded.
    UpdateAvailable,
    /// The run failed.
    Failed,
}

impl UpdatePhase {
    /// Whether a run stops in this phase.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::UpToDate | Self::ReadyToRestart | Self::UpdateAvailable | Self::Failed
        )
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::CheckingManifest => "checking-manifest",
            Self::UpToDate => "up-to-date",
            Self::PreparingUpdate => "preparing-update",
            Self::CheckingExistingDownload => "checking-existing-download",
            Self::ReadyToRestart => "ready-to-restart",
            Self::Downloading => "downloading",
            Self::UpdateAvailable => "update-available",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of one orchestrator run.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// The running version is the latest.
    UpToDate,
    /// A completed download was handed to the updater; the application
    /// should exit.
    ReadyToRestart {
        /// Version being applied.
        version: Version,
        /// The launched updater.
        updater: LaunchedUpdater,
    },
    /// The latest release was downloaded and will be applied next run.
    UpdateAvailable {
        /// Downloaded version.
        version: Version,
        /// Path of the completed download.
        artifact: PathBuf,
    },
    /// The run failed.
    Failed(Error),
}

impl UpdateOutcome {
    /// Phase the run ended in.
    #[must_use]
    pub fn phase(&self) -> UpdatePhase {
        match self {
            Self::UpToDate => UpdatePhase::UpToDate,
            Self::ReadyToRestart { .. } => UpdatePhase::ReadyToRestart,
            Self::UpdateAvailable { .. } => UpdatePhase::UpdateAvailable,
            Self::Failed(_) => UpdatePhase::Failed,
        }
    }

    /// Lifecycle event announcing this outcome.
    #[must_use]
    pub fn event(&self) -> UpdateEvent {
        match self {
            Self::UpToDate => UpdateEvent::UpToDate,
            Self::ReadyToRestart { version, .. } => UpdateEvent::ReadyToRestart {
                version: version.to_string(),
            },
            Self::UpdateAvailable { version, .. } => UpdateEvent::UpdateAvailable {
                version: version.to_string(),
            },
            Self::Failed(e) => UpdateEvent::Error {
                kind: e.kind().to_string(),
                message: e.to_string(),
            },
        }
    }
}

/// Sequences manifest check, download and restart handoff.
///
/// `start` takes `&mut self`, so one orchestrator never runs twice at once.
/// Separate processes sharing the same working folder are not coordinated.
pub struct UpdateOrchestrator<'a> {
    config: &'a PackageConfig,
    current_version: Version,
    manifest_url: String,
    updater_binary: String,
    fetcher: ManifestFetcher,
    downloader: Downloader,
    launcher: RestartLauncher,
    events: Option<UpdateEventsSender>,
    phase: UpdatePhase,
}

impl<'a> UpdateOrchestrator<'a> {
    /// Create an orchestrator for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured version is malformed, the platform
    /// is unsupported, or the updater directory cannot be located.
    pub fn new(config: &'a PackageConfig) -> Result<Self> {
        let current_version = config.validate()?;
        let strategy = PlatformStrategy::for_platform(&config.platform)?;
        let bundled_dir = config.updater_dir()?.join(&config.platform);
        let launcher = RestartLauncher::new(bundled_dir, strategy, config.install_base()?);

        Ok(Self {
            config,
            current_version,
            manifest_url: config.manifest_url(),
            updater_binary: strategy.updater_binary_name(&config.arch),
            fetcher: ManifestFetcher::new(),
            downloader: Downloader::new(),
            launcher,
            events: None,
            phase: UpdatePhase::Idle,
        })
    }

    /// Publish lifecycle events on `sender`.
    #[must_use]
    pub fn with_events(mut self, sender: UpdateEventsSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// Use a shared HTTP client for manifest and payload requests.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.fetcher = ManifestFetcher::with_client(client.clone());
        self.downloader = Downloader::with_client(client);
        self
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    /// Version of the running application.
    #[must_use]
    pub fn current_version(&self) -> &Version {
        &self.current_version
    }

    /// Manifest URL polled by this orchestrator.
    #[must_use]
    pub fn manifest_url(&self) -> &str {
        &self.manifest_url
    }

    /// Run one update check.
    ///
    /// Never returns an error directly: failures are reported as
    /// [`UpdateOutcome::Failed`] and an `error` event. Calling `start` again
    /// after a failure resumes from scratch.
    pub async fn start(&mut self) -> UpdateOutcome {
        info!(
            "Starting update check for {} v{}",
            self.config.executable_name, self.current_version
        );

        let outcome = match self.run().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Update failed: {e}");
                UpdateOutcome::Failed(e)
            }
        };

        self.transition(outcome.phase());
        self.emit(outcome.event());
        outcome
    }

    async fn run(&mut self) -> Result<UpdateOutcome> {
        let state = UpdateState::new(self.config.temp_dir(), self.updater_binary.clone());

        self.transition(UpdatePhase::CheckingManifest);
        info!("Getting manifest at {}", self.manifest_url);
        let manifest = self.fetcher.fetch(&self.manifest_url).await?;
        let state = state.with_manifest(&manifest);

        info!(
            "Comparing {} / {}",
            self.current_version, manifest.version
        );
        if !self.current_version.is_older_than(&manifest.version) {
            info!("App is up to date");
            return Ok(UpdateOutcome::UpToDate);
        }

        self.transition(UpdatePhase::PreparingUpdate);
        info!("Making temporary directory {}", state.temp_dir().display());
        tokio::fs::create_dir_all(state.temp_dir())
            .await
            .map_err(|e| Error::filesystem(state.temp_dir(), e))?;

        let final_artifact = state
            .final_artifact()
            .ok_or_else(|| Error::Manifest("no artifact path for manifest".to_string()))?
            .to_path_buf();

        self.transition(UpdatePhase::CheckingExistingDownload);
        if artifact_exists(&final_artifact).await? {
            info!("Update is already downloaded at {}", final_artifact.display());
            let updater = self
                .launcher
                .prepare_restart(
                    state.updater_binary(),
                    state.temp_dir(),
                    &final_artifact,
                    &self.config.executable_name,
                )
                .await?;
            return Ok(UpdateOutcome::ReadyToRestart {
                version: manifest.version,
                updater,
            });
        }
        info!("Update is not downloaded");

        clear_temp_download(state.temp_download()).await?;

        self.transition(UpdatePhase::Downloading);
        self.download(&manifest, &state, &final_artifact).await?;

        Ok(UpdateOutcome::UpdateAvailable {
            version: manifest.version,
            artifact: final_artifact,
        })
    }

    async fn download(
        &self,
        manifest: &Manifest,
        state: &UpdateState,
        final_artifact: &Path,
    ) -> Result<u64> {
        let source_url = self.config.payload_url(&manifest.path);
        let events = self.events.clone();
        self.downloader
            .download(
                &source_url,
                state.temp_download(),
                final_artifact,
                |downloaded, total| {
                    if let Some(ref tx) = events {
                        let _ = tx.send(UpdateEvent::DownloadProgress { downloaded, total });
                    }
                },
            )
            .await
    }

    fn transition(&mut self, next: UpdatePhase) {
        debug!("Update phase {} -> {next}", self.phase);
        self.phase = next;
    }

    fn emit(&self, event: UpdateEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event);
        }
    }
}

/// Whether a completed download is already present.
async fn artifact_exists(path: &Path) -> Result<bool> {
    debug!("Checking for an update downloaded at {}", path.display());
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::filesystem(path, e)),
    }
}

/// Remove a partial download left by an earlier run.
async fn clear_temp_download(path: &Path) -> Result<()> {
    debug!("Cleaning temporary download file {}", path.display());
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No temporary download file found");
            Ok(())
        }
        Err(e) => Err(Error::filesystem(path, e)),
    }
}

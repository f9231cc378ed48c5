//! Update lifecycle event system.

use tokio::sync::broadcast;

/// Events emitted by the update orchestrator.
///
/// Each run emits at most one terminal event (`UpToDate`, `ReadyToRestart`,
/// `UpdateAvailable` or `Error`). `DownloadProgress` may fire any number of
/// times before `UpdateAvailable` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// The running version is current.
    UpToDate,

    /// A completed download was found and the updater has been launched.
    ReadyToRestart {
        /// Version the updater is applying.
        version: String,
    },

    /// A new release has been downloaded and is ready for the next start.
    UpdateAvailable {
        /// Downloaded version.
        version: String,
    },

    /// Bytes received so far for the payload being downloaded.
    DownloadProgress {
        /// Bytes written to disk.
        downloaded: u64,
        /// Total size if the server announced one.
        total: Option<u64>,
    },

    /// The run failed.
    Error {
        /// Error class (`manifest`, `download`, ...).
        kind: String,
        /// Error message.
        message: String,
    },
}

impl UpdateEvent {
    /// Wire name of the event as seen by UI listeners.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::UpToDate => "up-to-date",
            Self::ReadyToRestart { .. } => "ready-to-restart",
            Self::UpdateAvailable { .. } => "update-available",
            Self::DownloadProgress { .. } => "download-progress",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this event ends a run.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::DownloadProgress { .. })
    }
}

/// Channel for receiving update events.
pub type UpdateEventsChannel = broadcast::Receiver<UpdateEvent>;

/// Sender for update events.
pub type UpdateEventsSender = broadcast::Sender<UpdateEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (UpdateEventsSender, UpdateEventsChannel) {
    broadcast::channel(256)
}

//! Error types for saorsa-autoupdate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while checking for, downloading or launching an update.
#[derive(Debug, Error)]
pub enum Error {
    /// A version string is malformed or the value is not a string at all.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The update manifest could not be retrieved or parsed.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// The update payload could not be downloaded or promoted.
    #[error("Download error: {0}")]
    Download(String),

    /// A filesystem operation on the working folder failed.
    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        /// Path the operation was acting on.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error outside of the update working folder.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an I/O error with the path it occurred on.
    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Short lowercase name of the error class, used in lifecycle events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid-input",
            Self::Manifest(_) => "manifest",
            Self::Download(_) => "download",
            Self::Filesystem { .. } | Self::Io(_) => "filesystem",
            Self::Config(_) => "config",
        }
    }
}

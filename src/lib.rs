//! # saorsa-autoupdate
//!
//! Self-update orchestrator for Saorsa desktop applications.
//!
//! One call to [`UpdateOrchestrator::start`] runs a full update lifecycle:
//!
//! 1. fetch `{feed}/{platform}/{arch}/latest.json`
//! 2. compare the advertised version with the running one
//! 3. if a newer release was already downloaded by an earlier run, stage the
//!    platform updater binary and launch it detached
//! 4. otherwise stream the release payload to the working folder for the
//!    next run to apply
//!
//! The updater binary itself, which replaces files and restarts the
//! application, is a separate executable bundled with the application.
//!
//! ## Example
//!
//! ```no_run
//! use saorsa_autoupdate::{PackageConfig, UpdateOrchestrator, UpdateOutcome};
//!
//! # async fn run() -> saorsa_autoupdate::Result<()> {
//! let config = PackageConfig::new("1.0.0", "https://updates.example.com/my-app", "my-app");
//! let mut orchestrator = UpdateOrchestrator::new(&config)?;
//!
//! match orchestrator.start().await {
//!     UpdateOutcome::ReadyToRestart { .. } => std::process::exit(0),
//!     UpdateOutcome::Failed(e) => return Err(e),
//!     _ => {}
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod download;
pub mod error;
pub mod event;
pub mod manifest;
pub mod orchestrator;
pub mod restart;
pub mod state;
pub mod version;

pub use config::PackageConfig;
pub use download::Downloader;
pub use error::{Error, Result};
pub use event::{create_event_channel, UpdateEvent, UpdateEventsChannel, UpdateEventsSender};
pub use manifest::{Manifest, ManifestFetcher};
pub use orchestrator::{UpdateOrchestrator, UpdateOutcome, UpdatePhase};
pub use restart::{LaunchedUpdater, PlatformStrategy, RestartLauncher};
pub use state::UpdateState;
pub use version::{compare, Version};

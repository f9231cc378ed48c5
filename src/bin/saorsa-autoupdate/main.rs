//! saorsa-autoupdate CLI entry point.

mod cli;

use clap::Parser;
use cli::Cli;
use color_eyre::eyre::eyre;
use saorsa_autoupdate::{
    create_event_channel, UpdateEvent, UpdateEventsChannel, UpdateOrchestrator, UpdateOutcome,
};
use std::cmp::Ordering;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    if let Some(ref versions) = cli.compare {
        let [a, b] = versions.as_slice() else {
            return Err(eyre!("--compare takes exactly two versions"));
        };
        let result = match saorsa_autoupdate::compare(a, b)? {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        };
        println!("{result}");
        return Ok(());
    }

    info!("saorsa-autoupdate v{}", env!("CARGO_PKG_VERSION"));

    // Build configuration
    let config = cli.into_config()?;

    let (events_tx, events_rx) = create_event_channel();
    let mut orchestrator = UpdateOrchestrator::new(&config)?.with_events(events_tx);

    let listener = tokio::spawn(log_events(events_rx));

    let outcome = orchestrator.start().await;
    let _ = listener.await;

    match outcome {
        UpdateOutcome::UpToDate => println!("up-to-date"),
        UpdateOutcome::UpdateAvailable { version, artifact } => {
            println!("update-available {version} {}", artifact.display());
        }
        UpdateOutcome::ReadyToRestart { version, updater } => {
            println!("ready-to-restart {version} (updater pid {})", updater.pid);
            info!("Exiting so the updater can apply {version}");
        }
        UpdateOutcome::Failed(e) => return Err(e.into()),
    }

    Ok(())
}

/// Log lifecycle events until the terminal one arrives or the sender closes.
///
/// Returns the terminal event, if one was seen.
async fn log_events(mut events_rx: UpdateEventsChannel) -> Option<UpdateEvent> {
    loop {
        match events_rx.recv().await {
            Ok(UpdateEvent::DownloadProgress { downloaded, total }) => {
                debug!("Downloaded {downloaded} of {total:?} bytes");
            }
            Ok(event) => {
                info!("Event: {}", event.name());
                if event.is_terminal() {
                    return Some(event);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Event listener fell behind, skipped {skipped} events");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

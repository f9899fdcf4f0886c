use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::{broadcast, mpsc};

use waymark_core::filter::FilterConfig;
use waymark_daemon::coordinator::{Coordinator, ImageOutcome, ViewNotification};
use waymark_daemon::flickr::{FlickrImageService, FlickrMetadataService, clear_cache_dir};
use waymark_daemon::handle::CoordinatorHandle;
use waymark_daemon::sensor::ReplaySensor;

#[derive(Parser)]
#[command(
    name = "waymark",
    about = "Track movement and collect a photo for every place you pass"
)]
struct Cli {
    /// Flickr API key for the metadata search
    #[arg(long, env = "WAYMARK_API_KEY")]
    api_key: String,

    /// Minimum displacement in meters between reported samples
    #[arg(long, default_value_t = 100.0)]
    distance_threshold_m: f64,

    /// Maximum acceptable horizontal accuracy in meters
    #[arg(long, default_value_t = 100.0)]
    desired_accuracy_m: f64,

    /// Directory where fetched images are staged
    #[arg(long, default_value = "/tmp/waymark")]
    cache_dir: PathBuf,

    /// JSONL file of position samples replayed as the sensor stream
    #[arg(long)]
    replay: PathBuf,

    /// Milliseconds between replayed samples
    #[arg(long, default_value_t = 1000)]
    replay_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing. Respects RUST_LOG env var, defaults to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(
        distance_threshold_m = cli.distance_threshold_m,
        desired_accuracy_m = cli.desired_accuracy_m,
        cache_dir = %cli.cache_dir.display(),
        replay = %cli.replay.display(),
        "starting waymark"
    );

    // The index is not persisted, so every launch starts clean: drop any
    // images staged by a previous run.
    std::fs::create_dir_all(&cli.cache_dir)?;
    clear_cache_dir(&cli.cache_dir)?;

    // ---------------------------------------------------------------
    // 1. Channels: all producers feed one coordination loop.
    // ---------------------------------------------------------------
    let (events_tx, events_rx) = mpsc::channel(256);
    let (notify_tx, notify_rx) = broadcast::channel(64);

    // ---------------------------------------------------------------
    // 2. Collaborators: sensor and the two fetch services.
    // ---------------------------------------------------------------
    let sensor = Arc::new(ReplaySensor::new(
        cli.replay.clone(),
        events_tx.clone(),
        Duration::from_millis(cli.replay_interval_ms),
    ));
    let metadata = Arc::new(FlickrMetadataService::new(cli.api_key)?);
    let images = Arc::new(FlickrImageService::new(cli.cache_dir)?);

    // ---------------------------------------------------------------
    // 3. Coordinator and presentation adapter.
    // ---------------------------------------------------------------
    let config = FilterConfig {
        distance_threshold_m: cli.distance_threshold_m,
        desired_accuracy_m: cli.desired_accuracy_m,
    };
    let mut coordinator = Coordinator::new(
        config,
        sensor,
        metadata,
        images,
        events_rx,
        events_tx,
        notify_tx,
    );
    let handle = coordinator.handle();
    coordinator.start();

    tokio::select! {
        _ = coordinator.run() => {
            tracing::warn!("coordinator exited unexpectedly");
        }
        _ = run_console_view(handle, notify_rx) => {
            tracing::warn!("console view exited unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    tracing::info!("waymark stopped");
    Ok(())
}

/// Minimal presentation adapter: logs refreshes and keeps the most recent
/// photo downloaded, the way a visible list top would.
async fn run_console_view(
    handle: CoordinatorHandle,
    mut notify_rx: broadcast::Receiver<ViewNotification>,
) {
    loop {
        match notify_rx.recv().await {
            Ok(ViewNotification::RefreshAll) => {
                let count = handle.count().await;
                tracing::info!(count, "index updated");
                match handle.request_image(0).await {
                    ImageOutcome::Ready(path) => {
                        tracing::info!(path = %path.display(), "latest image ready");
                    }
                    ImageOutcome::Pending => {
                        tracing::debug!("latest image downloading");
                    }
                    ImageOutcome::Unavailable => {}
                }
            }
            Ok(ViewNotification::RefreshSlot(slot)) => {
                if let ImageOutcome::Ready(path) = handle.request_image(slot).await {
                    tracing::info!(slot, path = %path.display(), "image ready");
                }
            }
            Ok(ViewNotification::SensorAlert(error)) => {
                tracing::warn!(error = %error, "location alert");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "view notifications lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

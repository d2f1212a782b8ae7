//! # Client Binary Entry Point
//!
//! Thin wrapper that runs the geosnap capture client.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin client -- --config config/client.toml
//! ```
//!
//! For a timed session with exported stats:
//! ```bash
//! cargo run --bin client -- --config config/client.toml \
//!   --shots 5 --stats-output ./session.json
//! ```
//!
//! The client will:
//! 1. Load configuration from the specified TOML file
//! 2. Build the camera backend and location provider it names
//! 3. Backfill the gallery from the server's existing photo listing
//! 4. Start the background gallery refresher (if enabled)
//! 5. Capture and upload the configured number of shots
//! 6. Export session stats to JSON (if --stats-output is specified)

use anyhow::{anyhow, Result};
use clap::Parser;
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

// Import from the library crate
use geosnap::capture::controller::{
    CameraBackendKind, CameraSettings, LocationMode, LocationSettings,
};
use geosnap::capture::folder_camera::FolderCamera;
use geosnap::capture::geolocate::{DisabledLocator, FixedLocator, HttpLocator};
use geosnap::capture::shell_camera::ShellCamera;
use geosnap::capture::{
    CameraBackend, CaptureController, CaptureStats, ClientConfig, LocationProvider, PhotoUploader,
};
use geosnap::common::{CapturedPhoto, GeoPoint};
use geosnap::gallery::{Gallery, GalleryEntry, GalleryRefresher};

/// Command-line arguments for the client binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the client configuration file (TOML format)
    ///
    /// Example: config/client.toml
    #[arg(short, long)]
    config: String,

    /// Override the upload server base URL from the config file
    #[arg(long)]
    server_url: Option<String>,

    /// Override the number of shots to take
    #[arg(long)]
    shots: Option<u32>,

    /// Path to write session stats JSON output (optional)
    #[arg(long)]
    stats_output: Option<String>,
}

/// Initialize the logging system with timestamp, level, and message formatting.
///
/// Logs are printed to stdout with INFO level by default.
/// Format: `[HH:MM:SS] [LEVEL] message`
fn init_logger() {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .init();
}

/// Build the camera backend named by the config.
fn build_camera(settings: &CameraSettings) -> Result<Arc<dyn CameraBackend>> {
    match settings.backend {
        CameraBackendKind::Shell => Ok(Arc::new(ShellCamera::new(settings.grab_command.clone()))),
        CameraBackendKind::Folder => {
            let frames_dir = settings
                .frames_dir
                .clone()
                .ok_or_else(|| anyhow!("the folder camera backend needs [camera] frames_dir"))?;
            Ok(Arc::new(FolderCamera::new(frames_dir)))
        }
    }
}

/// Build the location provider named by the config.
fn build_locator(settings: &LocationSettings) -> Result<Arc<dyn LocationProvider>> {
    match settings.mode {
        LocationMode::Fixed => Ok(Arc::new(FixedLocator::new(GeoPoint::new(
            settings.latitude,
            settings.longitude,
        )))),
        LocationMode::Http => {
            let url = settings
                .url
                .clone()
                .ok_or_else(|| anyhow!("the http location mode needs [location] url"))?;
            Ok(Arc::new(HttpLocator::new(url)))
        }
        LocationMode::Off => Ok(Arc::new(DisabledLocator)),
    }
}

/// Keep a local copy of a captured photo next to the upload.
async fn archive_photo(dir: &Path, photo: &CapturedPhoto) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(photo.upload_filename());
    tokio::fs::write(&path, &photo.jpeg).await?;
    info!("💾 Archived {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logger();

    // Parse command-line arguments
    let args = Args::parse();

    // Load client configuration from TOML file, applying CLI overrides
    let mut config = ClientConfig::from_file(&args.config)?;
    if let Some(url) = args.server_url {
        config.client.server_url = url;
    }
    if let Some(shots) = args.shots {
        config.capture.shots = shots;
    }

    info!("Client '{}' starting", config.client.name);

    // Wire up the capture pipeline
    let camera = build_camera(&config.camera)?;
    let locator = build_locator(&config.location)?;
    let controller = CaptureController::new(camera, locator, config.capture_options());
    let uploader = Arc::new(PhotoUploader::new(config.client.server_url.clone()));
    let gallery = Arc::new(Mutex::new(Gallery::new(config.gallery.limit)));

    // Backfill the gallery with what the server already holds
    match uploader.list_photos().await {
        Ok(urls) => {
            let mut gallery = gallery.lock().await;
            let added = gallery.absorb_listing(urls);
            info!("🖼️ Gallery backfilled with {} existing photos", added);
        }
        Err(e) => warn!("Could not load existing photos: {}", e),
    }
    println!("{}", gallery.lock().await.render());

    // Keep the gallery current in the background
    let refresher = if config.gallery.refresh_interval_secs > 0 {
        Some(GalleryRefresher::spawn(
            gallery.clone(),
            uploader.clone(),
            Duration::from_secs(config.gallery.refresh_interval_secs),
        ))
    } else {
        None
    };

    let mut stats = CaptureStats::new(config.client.name.clone());
    let shots = config.capture.shots.max(1);
    let shot_interval = Duration::from_secs(config.capture.shot_interval_secs);

    for shot in 1..=shots {
        if shot > 1 {
            sleep(shot_interval).await;
        }
        info!("📸 Shot {}/{}", shot, shots);
        let started = Instant::now();

        let photo = match controller.capture().await {
            Ok(photo) => photo,
            Err(e) => {
                error!("❌ Capture failed: {}", e);
                stats.record_failure(shot, started.elapsed(), e.to_string());
                continue;
            }
        };

        // Local archive is best-effort; the upload is what matters
        if let Some(dir) = &config.capture.save_dir {
            if let Err(e) = archive_photo(dir, &photo).await {
                warn!("Could not archive photo locally: {}", e);
            }
        }

        match uploader.submit(&photo).await {
            Ok(receipt) => {
                stats.record_success(shot, started.elapsed(), receipt.photo_url.clone());
                info!("✅ Uploaded {}", uploader.absolute_url(&receipt.photo_url));

                let mut gallery = gallery.lock().await;
                gallery.record_capture(GalleryEntry::new(receipt.photo_url));
                println!("{}", gallery.render());
            }
            Err(e) => {
                error!("❌ Upload failed: {}", e);
                stats.record_failure(shot, started.elapsed(), e.to_string());
            }
        }
    }

    // Stop polling before the summary so the gallery stops moving
    if let Some(refresher) = refresher {
        refresher.stop();
    }

    let summary = stats.summarize();
    info!(
        "✅ Session finished: {}/{} shots uploaded",
        summary.uploaded, summary.total_shots
    );

    if let Some(path) = &args.stats_output {
        stats.export_to_json(path)?;
        info!("📊 Session stats exported to: {}", path);
    }

    Ok(())
}

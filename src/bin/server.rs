//! # Server Binary Entry Point
//!
//! Thin wrapper that runs the geosnap upload/gallery server.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin server -- --config config/server.toml
//! ```
//!
//! The server will:
//! 1. Load configuration from the specified TOML file
//! 2. Create the content directory if it does not exist yet
//! 3. Serve `POST /upload`, `GET /photos`, `GET /health` and the stored
//!    files under the configured public prefix

use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::io::Write;
use std::sync::Arc;

// Import from the library crate
use geosnap::common::config::load_config;
use geosnap::server::{build_router, AppState, ContentStore, ServerConfig};

/// Command-line arguments for the server binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the server configuration file (TOML format)
    ///
    /// Example: config/server.toml
    #[arg(short, long)]
    config: String,
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logger();

    // Parse command-line arguments
    let args = Args::parse();

    // Load server configuration from TOML file
    let config: ServerConfig = load_config(&args.config)?;

    info!("🚀 Initializing upload server...");

    // Set up the content store (creates the directory if needed)
    let store = ContentStore::new(
        &config.storage.content_dir,
        &config.storage.public_prefix,
    )
    .await?;
    info!(
        "💾 Storing photos in {} (limit {} bytes per upload)",
        store.root().display(),
        config.storage.max_upload_bytes
    );

    let state = Arc::new(AppState {
        store,
    });
    let app = build_router(state, config.storage.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.address).await?;
    info!("🌐 Server running on http://{}", config.server.address);
    info!(
        "📡 Upload endpoint: http://{}/upload",
        config.server.address
    );

    axum::serve(listener, app).await?;

    Ok(())
}

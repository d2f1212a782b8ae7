//! # HTTP Routes
//!
//! The server's whole surface:
//!
//! - `POST /upload` - multipart photo upload (`photo` file field plus
//!   `latitude`/`longitude` text fields)
//! - `GET /photos` - every stored photo as a JSON array of URLs
//! - `GET /uploads/...` - the stored files themselves, served statically
//! - `GET /health` - liveness probe
//!
//! Upload failures answer with an HTTP error status *and* the protocol's
//! JSON failure body, so browser-style clients that only read the body still
//! see `success: false` with a human-readable reason.

use axum::{
    extract::multipart::{Field, Multipart},
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use super::store::ContentStore;
use crate::common::{GeoPoint, UploadResponse};

/// Shared state handed to every handler.
pub struct AppState {
    pub store: ContentStore,
}

/// Build the application router.
///
/// The static file service is nested under the store's public prefix so the
/// URLs in upload receipts and listings resolve against this same router.
/// CORS is wide open; the server is meant to sit behind whatever origin the
/// capture clients run on.
pub fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    let content_files = ServeDir::new(state.store.root());
    let public_prefix = state.store.public_prefix().to_string();

    Router::new()
        .route("/upload", post(upload_photo))
        .route("/photos", get(list_photos))
        .route("/health", get(health_check))
        .nest_service(&public_prefix, content_files)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "geosnap-upload"
    }))
}

/// List every stored photo. Storage trouble shows as an empty array, never an
/// error; the gallery prefers showing nothing over breaking.
async fn list_photos(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.store.list().await)
}

async fn upload_photo(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, Json<UploadResponse>)> {
    let mut photo: Option<(Option<String>, Vec<u8>)> = None;
    let mut location = GeoPoint::ORIGIN;

    // Parse multipart form data
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        reject(
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "photo" => {
                let client_name = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(|e| {
                    reject(
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read photo data: {}", e),
                    )
                })?;
                photo = Some((client_name, data.to_vec()));
            }
            "latitude" => location.latitude = field_as_coordinate(field).await,
            "longitude" => location.longitude = field_as_coordinate(field).await,
            _ => {}
        }
    }

    let Some((client_name, data)) = photo else {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "No photo file provided.".to_string(),
        ));
    };

    info!("📤 Received photo upload ({} bytes)", data.len());

    match state.store.save(client_name.as_deref(), &data).await {
        Ok(stored) => {
            info!("✅ Photo available at {}", stored.url);
            Ok((
                StatusCode::OK,
                Json(UploadResponse::stored(stored.url, location)),
            ))
        }
        Err(e) => {
            error!("❌ Could not store photo: {}", e);
            Err(reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Could not store photo: {}", e),
            ))
        }
    }
}

/// Malformed or missing coordinates degrade to 0 rather than failing the
/// upload; position metadata is never worth losing the photo over.
async fn field_as_coordinate(field: Field<'_>) -> f64 {
    field
        .text()
        .await
        .ok()
        .and_then(|text| text.trim().parse().ok())
        .unwrap_or(0.0)
}

fn reject(status: StatusCode, error: String) -> (StatusCode, Json<UploadResponse>) {
    (status, Json(UploadResponse::failure(error)))
}

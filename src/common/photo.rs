//! # Photo Data and Wire Types
//!
//! Data structures shared between the capture client and the upload server:
//! the in-memory representation of a captured photo, the geolocation point
//! attached to it, and the JSON body returned by the upload endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographic coordinate pair attached to a captured photo.
///
/// Coordinates are plain WGS84 degrees. When no location could be resolved
/// the client falls back to [`GeoPoint::ORIGIN`] rather than omitting the
/// fields, so the server always receives numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees, positive north
    pub latitude: f64,
    /// Longitude in degrees, positive east
    pub longitude: f64,
}

impl GeoPoint {
    /// The `{0, 0}` placeholder used when location lookup fails or times out.
    pub const ORIGIN: GeoPoint = GeoPoint {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        GeoPoint::ORIGIN
    }
}

/// A photo captured by the client, ready for upload.
///
/// The image is already encoded as JPEG; capture-time transforms (mirroring
/// for front-facing cameras) have been applied before encoding.
#[derive(Debug, Clone)]
pub struct CapturedPhoto {
    /// Encoded JPEG bytes
    pub jpeg: Vec<u8>,
    /// Wall-clock time the frame was taken
    pub taken_at: DateTime<Utc>,
    /// Resolved device location, if lookup succeeded within its deadline
    pub location: Option<GeoPoint>,
    /// Whether the frame was mirrored horizontally before encoding
    pub mirrored: bool,
}

impl CapturedPhoto {
    /// The location to report upstream: the resolved point, or `{0, 0}` when
    /// lookup failed or timed out.
    pub fn location_or_origin(&self) -> GeoPoint {
        self.location.unwrap_or(GeoPoint::ORIGIN)
    }

    /// Client-side filename sent with the multipart upload,
    /// e.g. `selfie-1732212345678.jpg`.
    ///
    /// The server never trusts this name; it only borrows the extension when
    /// generating its own storage name.
    pub fn upload_filename(&self) -> String {
        format!("selfie-{}.jpg", self.taken_at.timestamp_millis())
    }
}

/// JSON body returned by the upload endpoint.
///
/// Success and failure share one shape distinguished by the `success` flag:
/// successful uploads carry `message`, `photoUrl` and the echoed `location`,
/// failures carry `error`. Absent fields are omitted from the JSON entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Application-level outcome flag; clients must check this, not just the
    /// HTTP status
    pub success: bool,
    /// Human-readable confirmation, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Server-relative URL where the stored photo is served
    #[serde(rename = "photoUrl", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    /// Location echoed back from the upload form fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Human-readable failure description, present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResponse {
    /// Build the success body for a freshly stored photo.
    pub fn stored(photo_url: String, location: GeoPoint) -> Self {
        UploadResponse {
            success: true,
            message: Some("Photo uploaded successfully".to_string()),
            photo_url: Some(photo_url),
            location: Some(location),
            error: None,
        }
    }

    /// Build the failure body with a human-readable reason.
    pub fn failure(error: impl Into<String>) -> Self {
        UploadResponse {
            success: false,
            message: None,
            photo_url: None,
            location: None,
            error: Some(error.into()),
        }
    }
}

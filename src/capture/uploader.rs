//! # Photo Uploader
//!
//! HTTP client side of the upload protocol: multipart submission of captured
//! photos and bulk listing of what the server already holds.
//!
//! The upload endpoint answers failures with an HTTP error status *and* a
//! JSON body carrying `success: false`, so the uploader parses the body
//! regardless of status and decides on the application-level flag. A server
//! rejection therefore surfaces with the server's own message, word for word,
//! while transport problems surface as [`UploadError::Network`].

use log::{debug, info};
use thiserror::Error;

use crate::common::{CapturedPhoto, UploadResponse};

#[derive(Debug, Error)]
pub enum UploadError {
    /// The request never completed (refused connection, DNS, timeout, ...)
    #[error("network error during upload: {0}")]
    Network(#[from] reqwest::Error),
    /// The server answered and said no; carries the server's message verbatim
    #[error("{message}")]
    Rejected { message: String },
    /// The server answered with something that is not the upload protocol
    #[error("unexpected server response: {0}")]
    InvalidResponse(String),
}

/// Outcome of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    /// Server-relative URL where the photo is now served
    pub photo_url: String,
    /// Human-readable confirmation from the server, if any
    pub message: Option<String>,
}

/// Client for the upload server.
pub struct PhotoUploader {
    client: reqwest::Client,
    base_url: String,
}

impl PhotoUploader {
    /// Creates an uploader for the given server base URL
    /// (e.g., "http://127.0.0.1:3000").
    pub fn new(base_url: impl Into<String>) -> Self {
        PhotoUploader {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submit one captured photo as `multipart/form-data`.
    ///
    /// The form carries the JPEG under the `photo` field plus `latitude` and
    /// `longitude` as text fields; a missing location degrades to `{0, 0}`
    /// rather than omitting the fields.
    ///
    /// # Returns
    ///
    /// * `Ok(UploadReceipt)` - The server accepted and stored the photo
    /// * `Err(UploadError)` - Transport failure, server rejection, or a
    ///   response outside the protocol
    pub async fn submit(&self, photo: &CapturedPhoto) -> Result<UploadReceipt, UploadError> {
        let location = photo.location_or_origin();
        let filename = photo.upload_filename();
        debug!(
            "Uploading {} ({} bytes) to {}",
            filename,
            photo.jpeg.len(),
            self.base_url
        );

        let part = reqwest::multipart::Part::bytes(photo.jpeg.clone())
            .file_name(filename)
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new()
            .part("photo", part)
            .text("latitude", location.latitude.to_string())
            .text("longitude", location.longitude.to_string());

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;

        // Error statuses still carry a protocol body; parse before judging
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| UploadError::InvalidResponse(e.to_string()))?;

        if body.success {
            let photo_url = body.photo_url.ok_or_else(|| {
                UploadError::InvalidResponse("success response without photoUrl".to_string())
            })?;
            info!("📤 Upload accepted: {}", photo_url);
            Ok(UploadReceipt {
                photo_url,
                message: body.message,
            })
        } else {
            Err(UploadError::Rejected {
                message: body
                    .error
                    .or(body.message)
                    .unwrap_or_else(|| "Upload failed".to_string()),
            })
        }
    }

    /// Fetch the server's full photo listing as server-relative URLs.
    pub async fn list_photos(&self) -> Result<Vec<String>, UploadError> {
        let response = self
            .client
            .get(format!("{}/photos", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        let urls = response
            .json::<Vec<String>>()
            .await
            .map_err(|e| UploadError::InvalidResponse(e.to_string()))?;
        debug!("Server lists {} photos", urls.len());
        Ok(urls)
    }

    /// Turn a server-relative URL from a receipt or listing into a full URL.
    pub fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let uploader = PhotoUploader::new("http://127.0.0.1:3000/");
        assert_eq!(
            uploader.absolute_url("/uploads/a.jpg"),
            "http://127.0.0.1:3000/uploads/a.jpg"
        );
    }

    #[test]
    fn test_absolute_url_passthrough() {
        let uploader = PhotoUploader::new("http://127.0.0.1:3000");
        assert_eq!(
            uploader.absolute_url("http://elsewhere/x.jpg"),
            "http://elsewhere/x.jpg"
        );
        assert_eq!(
            uploader.absolute_url("uploads/x.jpg"),
            "http://127.0.0.1:3000/uploads/x.jpg"
        );
    }
}

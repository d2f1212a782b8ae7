//! # Location Providers
//!
//! Geolocation is strictly best-effort: a capture never fails because the
//! device's position could not be resolved. The controller wraps
//! [`LocationProvider::resolve`] in a deadline and substitutes `{0, 0}` when
//! the lookup errors or times out.
//!
//! Three providers ship: a fixed point from config, an HTTP lookup against an
//! IP-geolocation endpoint, and a disabled stub for machines that should not
//! report a position at all.

use async_trait::async_trait;
use log::debug;
use thiserror::Error;

use crate::common::GeoPoint;

#[derive(Debug, Error)]
pub enum GeolocateError {
    #[error("location lookup failed: {0}")]
    Lookup(String),
    #[error("location support is disabled")]
    Disabled,
}

/// A source of the device's current position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn resolve(&self) -> Result<GeoPoint, GeolocateError>;
}

/// Always reports the same configured point.
pub struct FixedLocator {
    point: GeoPoint,
}

impl FixedLocator {
    pub fn new(point: GeoPoint) -> Self {
        FixedLocator {
            point,
        }
    }
}

#[async_trait]
impl LocationProvider for FixedLocator {
    async fn resolve(&self) -> Result<GeoPoint, GeolocateError> {
        Ok(self.point)
    }
}

/// Never reports a position; every capture falls back to `{0, 0}`.
pub struct DisabledLocator;

#[async_trait]
impl LocationProvider for DisabledLocator {
    async fn resolve(&self) -> Result<GeoPoint, GeolocateError> {
        Err(GeolocateError::Disabled)
    }
}

/// Resolves the position through an IP-geolocation HTTP endpoint.
///
/// The endpoint must answer with a JSON object carrying the coordinates under
/// `latitude`/`longitude` or the common short forms `lat`/`lon`/`lng`, which
/// covers the popular public services.
pub struct HttpLocator {
    client: reqwest::Client,
    url: String,
}

impl HttpLocator {
    pub fn new(url: impl Into<String>) -> Self {
        HttpLocator {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl LocationProvider for HttpLocator {
    async fn resolve(&self) -> Result<GeoPoint, GeolocateError> {
        debug!("Resolving location via {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| GeolocateError::Lookup(e.to_string()))?
            .error_for_status()
            .map_err(|e| GeolocateError::Lookup(e.to_string()))?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GeolocateError::Lookup(format!("bad response body: {}", e)))?;
        point_from_json(&body).ok_or_else(|| {
            GeolocateError::Lookup("response carried no usable coordinates".to_string())
        })
    }
}

fn point_from_json(body: &serde_json::Value) -> Option<GeoPoint> {
    let latitude = ["latitude", "lat"].iter().find_map(|k| body[*k].as_f64())?;
    let longitude = ["longitude", "lon", "lng"]
        .iter()
        .find_map(|k| body[*k].as_f64())?;
    Some(GeoPoint::new(latitude, longitude))
}

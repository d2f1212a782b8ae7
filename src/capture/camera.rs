//! # Camera Abstraction
//!
//! The capture controller never talks to camera hardware directly; it goes
//! through the [`CameraBackend`] trait defined here. A backend can enumerate
//! the devices it sees and open a [`CameraStream`] under a set of
//! [`CameraConstraints`]. The constraint set is deliberately small: an exact
//! device id, a facing hint, and an ideal resolution. How strictly those are
//! honored is up to the backend; the controller compensates by retrying with
//! progressively looser constraints.

use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors reported by camera backends.
///
/// The first three variants matter for user-facing error mapping: the
/// controller turns them into distinct capture failures with fixed messages.
/// Everything else travels as [`CameraError::Backend`] with free-form detail.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera not found: {0}")]
    NotFound(String),
    #[error("camera busy: {0}")]
    Busy(String),
    #[error("camera backend error: {0}")]
    Backend(String),
}

/// Which way the requested camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Towards the user (selfie camera). Accepts `"user"` in config files too.
    #[serde(alias = "user")]
    Front,
    /// Away from the user. Accepts `"back"` or `"environment"` in config files too.
    #[serde(alias = "back", alias = "environment")]
    Rear,
}

impl Facing {
    /// Best-effort check whether a device label looks like a camera facing
    /// this way.
    ///
    /// Labels are free-form vendor strings ("FaceTime HD Camera",
    /// "Integrated Webcam Front", ...), so this is a heuristic: a front
    /// camera is recognized by "front", "selfie" or "face" in the label, or
    /// by a generic "camera" label that does not say "back". The rear check
    /// mirrors that. A miss here is harmless; acquisition falls back to the
    /// facing hint and then to any camera at all.
    pub fn matches_label(self, label: &str) -> bool {
        let label = label.to_lowercase();
        match self {
            Facing::Front => {
                label.contains("front")
                    || label.contains("selfie")
                    || label.contains("face")
                    || (label.contains("camera") && !label.contains("back"))
            }
            Facing::Rear => {
                label.contains("back")
                    || label.contains("rear")
                    || label.contains("environment")
                    || (label.contains("camera") && !label.contains("front"))
            }
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::Front => write!(f, "front"),
            Facing::Rear => write!(f, "rear"),
        }
    }
}

/// One camera as reported by [`CameraBackend::enumerate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    /// Backend-specific identifier, stable enough to reopen the same device
    pub device_id: String,
    /// Human-readable label, used by the facing heuristic
    pub label: String,
}

/// Pick the first enumerated device whose label matches the wanted facing.
///
/// Devices are scanned in enumeration order and the first hit wins, so the
/// result is deterministic for a given device list.
pub fn find_candidate(devices: &[CameraInfo], facing: Facing) -> Option<&CameraInfo> {
    devices.iter().find(|d| facing.matches_label(&d.label))
}

/// Constraints passed to [`CameraBackend::open`].
///
/// `width`/`height` are ideal values, not requirements; backends deliver the
/// closest resolution they can.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConstraints {
    /// Open exactly this device, if set
    pub device_id: Option<String>,
    /// Prefer a camera facing this way, if set
    pub facing: Option<Facing>,
    /// Ideal frame width in pixels
    pub width: u32,
    /// Ideal frame height in pixels
    pub height: u32,
}

impl CameraConstraints {
    /// Strictest form: a known device id plus the facing hint.
    pub fn exact(device_id: impl Into<String>, facing: Facing, width: u32, height: u32) -> Self {
        CameraConstraints {
            device_id: Some(device_id.into()),
            facing: Some(facing),
            width,
            height,
        }
    }

    /// Facing hint only; the backend picks the device.
    pub fn facing_only(facing: Facing, width: u32, height: u32) -> Self {
        CameraConstraints {
            device_id: None,
            facing: Some(facing),
            width,
            height,
        }
    }

    /// No device preference at all; any camera will do.
    pub fn any(width: u32, height: u32) -> Self {
        CameraConstraints {
            device_id: None,
            facing: None,
            width,
            height,
        }
    }
}

/// An open camera stream holding the device until [`CameraStream::stop`] is
/// called.
///
/// Callers must stop the stream on every exit path, success or failure;
/// otherwise the device stays busy for other applications.
#[async_trait]
pub trait CameraStream: Send {
    /// The capture resolution this stream was opened with.
    fn resolution(&self) -> (u32, u32);

    /// True while the underlying device is still held open.
    fn is_live(&self) -> bool;

    /// Grab one frame from the stream.
    async fn grab_frame(&mut self) -> Result<RgbImage, CameraError>;

    /// Release the device. Best-effort and idempotent; problems are logged,
    /// not returned.
    async fn stop(&mut self);
}

/// A source of camera devices.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// List the devices this backend can currently see.
    ///
    /// Enumeration failure is not fatal for capture; the controller degrades
    /// to facing-based acquisition when the device list is unavailable.
    async fn enumerate(&self) -> Result<Vec<CameraInfo>, CameraError>;

    /// Open a stream under the given constraints.
    async fn open(&self, constraints: &CameraConstraints)
        -> Result<Box<dyn CameraStream>, CameraError>;
}

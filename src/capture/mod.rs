//! # Capture Components
//!
//! The capture client is split into a small set of collaborators:
//!
//! ## Capture Controller ([`controller`])
//! Orchestrates one photo from shutter press to encoded JPEG:
//! - Camera acquisition with a three-step constraint fallback
//! - Bounded geolocation lookup (never fatal)
//! - Warm-up delay, frame grab, optional mirror, JPEG encode
//! - Guaranteed release of the camera stream on every path
//!
//! ## Camera Backends ([`camera`], [`shell_camera`], [`folder_camera`])
//! The controller speaks to cameras through the [`camera::CameraBackend`]
//! trait. Two implementations ship: one that drives a real device through an
//! external grabber command, and one that replays frames from a directory.
//!
//! ## Location Providers ([`geolocate`])
//! Best-effort geolocation behind the [`geolocate::LocationProvider`] trait.
//!
//! ## Uploader ([`uploader`])
//! Multipart HTTP submission of captured photos and bulk listing of what the
//! server already holds.
//!
//! ## Session Stats ([`stats`])
//! Per-shot success/latency bookkeeping with JSON export.

pub mod camera;
pub mod controller;
pub mod folder_camera;
pub mod geolocate;
pub mod shell_camera;
pub mod stats;
pub mod uploader;

// Re-export for convenience
pub use camera::{CameraBackend, CameraError, CameraInfo, Facing};
pub use controller::{CaptureController, CaptureError, CaptureOptions, ClientConfig};
pub use geolocate::LocationProvider;
pub use stats::CaptureStats;
pub use uploader::{PhotoUploader, UploadError};

//! # Common Components
//!
//! Shared utilities and data structures used by both the capture client and
//! the upload server.
//!
//! ## Modules
//!
//! - [`photo`]: Captured photo data and the JSON shapes spoken on the wire
//! - [`config`]: Configuration parsing utilities

pub mod config;
pub mod photo;

pub use photo::{CapturedPhoto, GeoPoint, UploadResponse};

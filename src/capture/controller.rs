//! # Capture Controller
//!
//! This module contains the controller that turns a shutter press into an
//! uploaded-ready JPEG, plus the client configuration it is built from.
//!
//! ## Responsibilities
//!
//! The [`CaptureController`] struct manages the full capture sequence:
//! - **Camera Acquisition**: Opens a stream with a three-step constraint fallback
//! - **Geolocation**: Resolves the device position under a deadline, never fatally
//! - **Stabilization**: Waits a short warm-up before grabbing the frame
//! - **Processing**: Mirrors front-camera frames and encodes JPEG off the runtime
//! - **Stream Hygiene**: Releases the camera on every path, success or failure
//! - **Re-entry Guard**: Rejects overlapping captures on the same controller
//!
//! ## Capture Workflow
//!
//! 1. **Acquire**: Walk the constraint fallback chain until a stream opens
//! 2. **Locate**: Ask the location provider, bounded by `location_timeout`
//! 3. **Stabilize**: Sleep `warmup` so exposure can settle
//! 4. **Grab**: Take one frame, then release the stream immediately
//! 5. **Encode**: Mirror if configured, encode JPEG at the configured quality
//!
//! ## Acquisition Fallback
//!
//! The chain loosens constraints one step at a time:
//!
//! 1. Exact device id of the label-matched candidate, plus the facing hint
//! 2. Facing hint only
//! 3. Any camera at all
//!
//! Device enumeration failing (or finding no labeled candidate) just skips
//! step 1. Only when the whole chain is exhausted does capture fail, and the
//! error the user sees is classified from the *last* attempt's failure.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};

use super::camera::{
    find_candidate, CameraBackend, CameraConstraints, CameraError, CameraStream, Facing,
};
use super::geolocate::LocationProvider;
use super::shell_camera::DEFAULT_GRAB_COMMAND;
use crate::common::{CapturedPhoto, GeoPoint};

/// Client configuration loaded from TOML file.
///
/// # Example TOML
///
/// ```toml
/// [client]
/// name = "kiosk-1"
/// server_url = "http://127.0.0.1:3000"
///
/// [camera]
/// backend = "shell"
/// facing = "front"
///
/// [capture]
/// jpeg_quality = 85
/// warmup_ms = 500
/// location_timeout_secs = 8
///
/// [location]
/// mode = "fixed"
/// latitude = 48.2082
/// longitude = 16.3738
///
/// [gallery]
/// limit = 10
/// refresh_interval_secs = 30
/// ```
///
/// Only `[client]` and `[camera] backend` are mandatory; everything else
/// falls back to the defaults shown above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Upload server connection information
    pub client: ClientInfo,
    /// Camera backend selection and frame geometry
    pub camera: CameraSettings,
    /// Capture sequence tuning
    #[serde(default)]
    pub capture: CaptureSettings,
    /// Location provider selection
    #[serde(default)]
    pub location: LocationSettings,
    /// Local gallery behavior
    #[serde(default)]
    pub gallery: GallerySettings,
}

/// Client identity and upload server connection information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Display name for this client, used in logs and session stats
    #[serde(default = "default_client_name")]
    pub name: String,
    /// Base URL of the upload server (e.g., "http://127.0.0.1:3000")
    pub server_url: String,
}

/// Which camera backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendKind {
    /// External frame grabber against a real video device
    Shell,
    /// Still images replayed from a directory
    Folder,
}

/// Camera backend selection and frame geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Backend to use ("shell" or "folder")
    pub backend: CameraBackendKind,
    /// Which way the camera should face (defaults to "front")
    #[serde(default = "default_facing")]
    pub facing: Facing,
    /// Mirror frames horizontally. Unset means: mirror exactly when the
    /// facing is "front", matching what users expect from a selfie preview.
    #[serde(default)]
    pub mirror: Option<bool>,
    /// Ideal frame width in pixels
    #[serde(default = "default_width")]
    pub width: u32,
    /// Ideal frame height in pixels
    #[serde(default = "default_height")]
    pub height: u32,
    /// Grabber command template for the shell backend
    #[serde(default = "default_grab_command")]
    pub grab_command: String,
    /// Frame directory for the folder backend
    #[serde(default)]
    pub frames_dir: Option<std::path::PathBuf>,
}

/// Capture sequence tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// JPEG quality, 1-100
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Warm-up delay before grabbing the frame (milliseconds)
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,
    /// How long to wait for a location fix before giving up (seconds)
    #[serde(default = "default_location_timeout_secs")]
    pub location_timeout_secs: u64,
    /// How many photos to take in one session
    #[serde(default = "default_shots")]
    pub shots: u32,
    /// Pause between consecutive shots (seconds)
    #[serde(default = "default_shot_interval_secs")]
    pub shot_interval_secs: u64,
    /// Also keep a local copy of every captured photo in this directory
    #[serde(default)]
    pub save_dir: Option<std::path::PathBuf>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        CaptureSettings {
            jpeg_quality: default_jpeg_quality(),
            warmup_ms: default_warmup_ms(),
            location_timeout_secs: default_location_timeout_secs(),
            shots: default_shots(),
            shot_interval_secs: default_shot_interval_secs(),
            save_dir: None,
        }
    }
}

/// Which location provider to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationMode {
    /// Fixed point from this config section
    Fixed,
    /// IP-geolocation lookup against `url`
    Http,
    /// No location; uploads carry `{0, 0}`
    #[default]
    Off,
}

/// Location provider selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationSettings {
    #[serde(default)]
    pub mode: LocationMode,
    /// Latitude for "fixed" mode
    #[serde(default)]
    pub latitude: f64,
    /// Longitude for "fixed" mode
    #[serde(default)]
    pub longitude: f64,
    /// Endpoint for "http" mode
    #[serde(default)]
    pub url: Option<String>,
}

/// Local gallery behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GallerySettings {
    /// How many entries the self-capture path keeps (oldest evicted)
    #[serde(default = "default_gallery_limit")]
    pub limit: usize,
    /// Poll the server listing this often (seconds). 0 disables polling.
    #[serde(default = "default_refresh_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for GallerySettings {
    fn default() -> Self {
        GallerySettings {
            limit: default_gallery_limit(),
            refresh_interval_secs: default_refresh_secs(),
        }
    }
}

fn default_client_name() -> String {
    "geosnap-client".to_string()
}

fn default_facing() -> Facing {
    Facing::Front
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_grab_command() -> String {
    DEFAULT_GRAB_COMMAND.to_string()
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_warmup_ms() -> u64 {
    500
}

fn default_location_timeout_secs() -> u64 {
    8
}

fn default_shots() -> u32 {
    1
}

fn default_shot_interval_secs() -> u64 {
    5
}

fn default_gallery_limit() -> usize {
    10
}

fn default_refresh_secs() -> u64 {
    30
}

impl ClientConfig {
    /// Loads client configuration from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    ///
    /// * `Ok(ClientConfig)` - Successfully parsed configuration
    /// * `Err(anyhow::Error)` - If file reading or parsing fails
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Collapse the camera and capture sections into the runtime options the
    /// controller works with.
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            facing: self.camera.facing,
            mirror: self
                .camera
                .mirror
                .unwrap_or(self.camera.facing == Facing::Front),
            width: self.camera.width,
            height: self.camera.height,
            jpeg_quality: self.capture.jpeg_quality,
            warmup: Duration::from_millis(self.capture.warmup_ms),
            location_timeout: Duration::from_secs(self.capture.location_timeout_secs),
        }
    }
}

/// Errors a capture attempt can surface to the user.
///
/// The first three variants carry one fixed message per cause so the user
/// always sees the same wording for the same problem; diagnostics detail only
/// travels with [`CaptureError::AcquisitionExhausted`].
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Camera access was denied. Please allow camera permissions and try again.")]
    PermissionDenied,
    #[error("No camera found on this device.")]
    NoCamera,
    #[error("Camera is already in use by another application.")]
    CameraBusy,
    #[error("Unable to access camera: {detail}")]
    AcquisitionExhausted { detail: String },
    #[error("A capture is already in progress.")]
    CaptureInProgress,
    #[error("Could not grab a frame from the camera: {0}")]
    Frame(String),
    #[error("Could not encode the captured photo: {0}")]
    Encode(String),
}

/// Runtime options for one controller, typically derived from
/// [`ClientConfig::capture_options`].
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Which way the camera should face
    pub facing: Facing,
    /// Mirror frames horizontally before encoding
    pub mirror: bool,
    /// Ideal frame width in pixels
    pub width: u32,
    /// Ideal frame height in pixels
    pub height: u32,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    /// Warm-up delay before grabbing the frame
    pub warmup: Duration,
    /// Deadline for the location lookup
    pub location_timeout: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        CaptureOptions {
            facing: Facing::Front,
            mirror: true,
            width: 1280,
            height: 720,
            jpeg_quality: 85,
            warmup: Duration::from_millis(500),
            location_timeout: Duration::from_secs(8),
        }
    }
}

/// Orchestrates one photo from shutter press to encoded JPEG.
///
/// The controller is cheap to share behind an `Arc`; overlapping
/// [`capture`](CaptureController::capture) calls on the same instance are
/// rejected rather than queued, because one camera cannot serve two captures.
pub struct CaptureController {
    /// Camera device source
    camera: Arc<dyn CameraBackend>,
    /// Best-effort position source
    locator: Arc<dyn LocationProvider>,
    /// Runtime options derived from config
    options: CaptureOptions,
    /// Set while a capture sequence is running
    in_flight: AtomicBool,
}

impl CaptureController {
    /// Creates a new `CaptureController`.
    ///
    /// # Arguments
    ///
    /// * `camera` - Backend providing camera devices
    /// * `locator` - Provider for the device position
    /// * `options` - Runtime options, usually from [`ClientConfig::capture_options`]
    pub fn new(
        camera: Arc<dyn CameraBackend>,
        locator: Arc<dyn LocationProvider>,
        options: CaptureOptions,
    ) -> Self {
        Self {
            camera,
            locator,
            options,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Takes one photo.
    ///
    /// Runs the full sequence: acquisition fallback, bounded location lookup,
    /// warm-up, frame grab, mirror and JPEG encode. The camera stream is
    /// released before this returns, on every path.
    ///
    /// # Returns
    ///
    /// * `Ok(CapturedPhoto)` - Encoded JPEG with timestamp and optional location
    /// * `Err(CaptureError)` - Classified failure with a user-facing message
    pub async fn capture(&self) -> Result<CapturedPhoto, CaptureError> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        let mut stream = self.acquire_stream().await?;
        let location = self.resolve_location().await;

        // Let exposure settle before grabbing
        sleep(self.options.warmup).await;

        let frame = match stream.grab_frame().await {
            Ok(frame) => {
                stream.stop().await;
                frame
            }
            Err(e) => {
                stream.stop().await;
                return Err(CaptureError::Frame(e.to_string()));
            }
        };

        let taken_at = Utc::now();
        let mirror = self.options.mirror;
        let quality = self.options.jpeg_quality;
        let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(frame, mirror, quality))
            .await
            .map_err(|e| CaptureError::Encode(format!("encoder task failed: {}", e)))??;

        info!(
            "📷 Captured photo ({} bytes{})",
            jpeg.len(),
            if location.is_some() {
                ", with location"
            } else {
                ", no location"
            }
        );
        Ok(CapturedPhoto {
            jpeg,
            taken_at,
            location,
            mirrored: mirror,
        })
    }

    /// Walk the constraint fallback chain until a stream opens.
    ///
    /// When every step fails, the error shown to the user is classified from
    /// the last attempt: permission, missing-device and busy failures keep
    /// their distinct messages, anything else collapses into
    /// [`CaptureError::AcquisitionExhausted`].
    async fn acquire_stream(&self) -> Result<Box<dyn CameraStream>, CaptureError> {
        let devices = match self.camera.enumerate().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Device enumeration failed: {}; continuing without it", e);
                Vec::new()
            }
        };

        let candidate = find_candidate(&devices, self.options.facing).cloned();
        if let Some(c) = &candidate {
            info!("Found {} camera: {}", self.options.facing, c.label);
        }

        let (width, height) = (self.options.width, self.options.height);
        let mut plan = Vec::with_capacity(3);
        if let Some(c) = &candidate {
            plan.push(CameraConstraints::exact(
                c.device_id.clone(),
                self.options.facing,
                width,
                height,
            ));
        }
        plan.push(CameraConstraints::facing_only(
            self.options.facing,
            width,
            height,
        ));
        plan.push(CameraConstraints::any(width, height));

        let total = plan.len();
        let mut last_error = None;
        for (index, constraints) in plan.iter().enumerate() {
            match self.camera.open(constraints).await {
                Ok(stream) => {
                    info!("📷 Camera acquired (strategy {}/{})", index + 1, total);
                    return Ok(stream);
                }
                Err(e) => {
                    warn!("Camera strategy {}/{} failed: {}", index + 1, total, e);
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(CameraError::PermissionDenied(_)) => CaptureError::PermissionDenied,
            Some(CameraError::NotFound(_)) => CaptureError::NoCamera,
            Some(CameraError::Busy(_)) => CaptureError::CameraBusy,
            Some(CameraError::Backend(detail)) => CaptureError::AcquisitionExhausted {
                detail,
            },
            None => CaptureError::AcquisitionExhausted {
                detail: "no acquisition strategy could run".to_string(),
            },
        })
    }

    /// Resolve the device position, bounded by `location_timeout`.
    ///
    /// Failures and timeouts are logged and swallowed; the capture continues
    /// and the upload falls back to `{0, 0}`.
    async fn resolve_location(&self) -> Option<GeoPoint> {
        match tokio::time::timeout(self.options.location_timeout, self.locator.resolve()).await {
            Ok(Ok(point)) => Some(point),
            Ok(Err(e)) => {
                info!("Continuing without location: {}", e);
                None
            }
            Err(_) => {
                info!(
                    "Location lookup exceeded {:?}; continuing without it",
                    self.options.location_timeout
                );
                None
            }
        }
    }
}

/// RAII flag marking a capture in flight; cleared on drop so an early return
/// can never leave the controller wedged.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, CaptureError> {
        if flag.swap(true, Ordering::SeqCst) {
            Err(CaptureError::CaptureInProgress)
        } else {
            Ok(InFlightGuard {
                flag,
            })
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Mirror (if requested) and JPEG-encode a frame. Runs on the blocking pool;
/// encoding a 720p frame is far too slow for a runtime worker.
fn encode_jpeg(frame: RgbImage, mirror: bool, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let frame = if mirror {
        imageops::flip_horizontal(&frame)
    } else {
        frame
    };
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(&frame)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::camera::CameraInfo;
    use crate::capture::geolocate::GeolocateError;
    use async_trait::async_trait;
    use image::Rgb;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Camera backend whose open() outcomes follow a script. Records every
    /// constraint set it was asked for and every stream it handed out.
    struct ScriptedCamera {
        devices: Vec<CameraInfo>,
        outcomes: Mutex<VecDeque<Result<(), CameraError>>>,
        opens: Mutex<Vec<CameraConstraints>>,
        streams: Mutex<Vec<Arc<AtomicBool>>>,
        open_delay: Duration,
        grab_fails: bool,
    }

    impl ScriptedCamera {
        fn new(devices: Vec<CameraInfo>, outcomes: Vec<Result<(), CameraError>>) -> Self {
            ScriptedCamera {
                devices,
                outcomes: Mutex::new(outcomes.into()),
                opens: Mutex::new(Vec::new()),
                streams: Mutex::new(Vec::new()),
                open_delay: Duration::ZERO,
                grab_fails: false,
            }
        }

        fn open_count(&self) -> usize {
            self.opens.lock().unwrap().len()
        }

        fn all_streams_stopped(&self) -> bool {
            self.streams
                .lock()
                .unwrap()
                .iter()
                .all(|live| !live.load(Ordering::SeqCst))
        }
    }

    #[async_trait]
    impl CameraBackend for ScriptedCamera {
        async fn enumerate(&self) -> Result<Vec<CameraInfo>, CameraError> {
            Ok(self.devices.clone())
        }

        async fn open(
            &self,
            constraints: &CameraConstraints,
        ) -> Result<Box<dyn CameraStream>, CameraError> {
            if !self.open_delay.is_zero() {
                sleep(self.open_delay).await;
            }
            self.opens.lock().unwrap().push(constraints.clone());
            // Past the end of the script every open succeeds
            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()));
            match outcome {
                Ok(()) => {
                    let live = Arc::new(AtomicBool::new(true));
                    self.streams.lock().unwrap().push(live.clone());
                    Ok(Box::new(ScriptedStream {
                        live,
                        grab_fails: self.grab_fails,
                    }))
                }
                Err(e) => Err(e),
            }
        }
    }

    struct ScriptedStream {
        live: Arc<AtomicBool>,
        grab_fails: bool,
    }

    #[async_trait]
    impl CameraStream for ScriptedStream {
        fn resolution(&self) -> (u32, u32) {
            (16, 16)
        }

        fn is_live(&self) -> bool {
            self.live.load(Ordering::SeqCst)
        }

        async fn grab_frame(&mut self) -> Result<RgbImage, CameraError> {
            if self.grab_fails {
                return Err(CameraError::Backend("frame grab refused".to_string()));
            }
            Ok(RgbImage::from_pixel(16, 16, Rgb([40, 80, 120])))
        }

        async fn stop(&mut self) {
            self.live.store(false, Ordering::SeqCst);
        }
    }

    struct OkLocator(GeoPoint);

    #[async_trait]
    impl LocationProvider for OkLocator {
        async fn resolve(&self) -> Result<GeoPoint, GeolocateError> {
            Ok(self.0)
        }
    }

    struct FailLocator;

    #[async_trait]
    impl LocationProvider for FailLocator {
        async fn resolve(&self) -> Result<GeoPoint, GeolocateError> {
            Err(GeolocateError::Lookup("no signal".to_string()))
        }
    }

    struct SlowLocator;

    #[async_trait]
    impl LocationProvider for SlowLocator {
        async fn resolve(&self) -> Result<GeoPoint, GeolocateError> {
            sleep(Duration::from_secs(30)).await;
            Ok(GeoPoint::ORIGIN)
        }
    }

    fn fast_options() -> CaptureOptions {
        CaptureOptions {
            facing: Facing::Front,
            mirror: false,
            width: 640,
            height: 480,
            jpeg_quality: 85,
            warmup: Duration::from_millis(1),
            location_timeout: Duration::from_millis(50),
        }
    }

    fn front_device() -> Vec<CameraInfo> {
        vec![CameraInfo {
            device_id: "/dev/video0".to_string(),
            label: "Front Camera".to_string(),
        }]
    }

    fn backend_err() -> CameraError {
        CameraError::Backend("constraints rejected".to_string())
    }

    #[tokio::test]
    async fn test_fallback_advances_past_failures() {
        let camera = Arc::new(ScriptedCamera::new(
            front_device(),
            vec![Err(backend_err()), Err(backend_err()), Ok(())],
        ));
        let controller = CaptureController::new(
            camera.clone(),
            Arc::new(OkLocator(GeoPoint::new(1.0, 2.0))),
            fast_options(),
        );

        let photo = controller.capture().await.unwrap();
        assert!(!photo.jpeg.is_empty());
        assert_eq!(camera.open_count(), 3);

        // The chain loosens constraints step by step
        let opens = camera.opens.lock().unwrap();
        assert!(opens[0].device_id.is_some());
        assert_eq!(opens[0].facing, Some(Facing::Front));
        assert!(opens[1].device_id.is_none());
        assert_eq!(opens[1].facing, Some(Facing::Front));
        assert!(opens[2].device_id.is_none());
        assert!(opens[2].facing.is_none());
    }

    #[tokio::test]
    async fn test_unlabeled_devices_skip_exact_strategy() {
        let devices = vec![CameraInfo {
            device_id: "/dev/video9".to_string(),
            label: "HDMI grabber".to_string(),
        }];
        let camera = Arc::new(ScriptedCamera::new(devices, vec![Err(backend_err())]));
        let controller =
            CaptureController::new(camera.clone(), Arc::new(FailLocator), fast_options());

        controller.capture().await.unwrap();

        // No candidate label, so the chain starts at the facing-only step
        assert_eq!(camera.open_count(), 2);
        assert!(camera.opens.lock().unwrap()[0].device_id.is_none());
    }

    async fn classify_last_failure(last: CameraError) -> CaptureError {
        let camera = Arc::new(ScriptedCamera::new(
            Vec::new(),
            vec![Err(backend_err()), Err(last)],
        ));
        let controller = CaptureController::new(camera, Arc::new(FailLocator), fast_options());
        controller.capture().await.err().unwrap()
    }

    #[tokio::test]
    async fn test_exhausted_chain_classifies_last_error() {
        let err = classify_last_failure(CameraError::PermissionDenied("EACCES".to_string())).await;
        assert!(matches!(err, CaptureError::PermissionDenied));

        let err = classify_last_failure(CameraError::NotFound("gone".to_string())).await;
        assert!(matches!(err, CaptureError::NoCamera));

        let err = classify_last_failure(CameraError::Busy("EBUSY".to_string())).await;
        assert!(matches!(err, CaptureError::CameraBusy));

        let err = classify_last_failure(CameraError::Backend("odd failure".to_string())).await;
        match err {
            CaptureError::AcquisitionExhausted { detail } => {
                assert!(detail.contains("odd failure"))
            }
            other => panic!("expected AcquisitionExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_capture_succeeds_without_location() {
        let camera = Arc::new(ScriptedCamera::new(front_device(), Vec::new()));
        let controller = CaptureController::new(camera, Arc::new(FailLocator), fast_options());

        let photo = controller.capture().await.unwrap();
        assert!(photo.location.is_none());
        assert_eq!(photo.location_or_origin(), GeoPoint::ORIGIN);
    }

    #[tokio::test]
    async fn test_location_timeout_is_not_fatal() {
        let camera = Arc::new(ScriptedCamera::new(front_device(), Vec::new()));
        let controller = CaptureController::new(camera, Arc::new(SlowLocator), fast_options());

        let photo = controller.capture().await.unwrap();
        assert!(photo.location.is_none());
    }

    #[tokio::test]
    async fn test_resolved_location_is_attached() {
        let camera = Arc::new(ScriptedCamera::new(front_device(), Vec::new()));
        let controller = CaptureController::new(
            camera,
            Arc::new(OkLocator(GeoPoint::new(48.2, 16.4))),
            fast_options(),
        );

        let photo = controller.capture().await.unwrap();
        assert_eq!(photo.location, Some(GeoPoint::new(48.2, 16.4)));
    }

    #[tokio::test]
    async fn test_stream_released_after_success() {
        let camera = Arc::new(ScriptedCamera::new(front_device(), Vec::new()));
        let controller =
            CaptureController::new(camera.clone(), Arc::new(FailLocator), fast_options());

        controller.capture().await.unwrap();
        assert!(camera.all_streams_stopped());
    }

    #[tokio::test]
    async fn test_stream_released_after_grab_failure() {
        let mut camera = ScriptedCamera::new(front_device(), Vec::new());
        camera.grab_fails = true;
        let camera = Arc::new(camera);
        let controller =
            CaptureController::new(camera.clone(), Arc::new(FailLocator), fast_options());

        let err = controller.capture().await.err().unwrap();
        assert!(matches!(err, CaptureError::Frame(_)));
        assert!(camera.all_streams_stopped());
    }

    #[tokio::test]
    async fn test_overlapping_capture_is_rejected() {
        let mut camera = ScriptedCamera::new(front_device(), Vec::new());
        camera.open_delay = Duration::from_millis(50);
        let camera = Arc::new(camera);
        let controller =
            CaptureController::new(camera.clone(), Arc::new(FailLocator), fast_options());

        let (first, second) = tokio::join!(controller.capture(), controller.capture());
        assert!(first.is_ok());
        assert!(matches!(second, Err(CaptureError::CaptureInProgress)));

        // The guard is released once the first capture finishes
        assert!(controller.capture().await.is_ok());
    }

    #[test]
    fn test_encode_mirrors_horizontally() {
        // Left half white, right half black
        let mut frame = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
        for y in 0..16 {
            for x in 0..8 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }

        let plain = encode_jpeg(frame.clone(), false, 95).unwrap();
        let decoded = image::load_from_memory(&plain).unwrap().to_rgb8();
        assert!(decoded.get_pixel(0, 8)[0] > 150, "left should stay bright");

        let mirrored = encode_jpeg(frame, true, 95).unwrap();
        let decoded = image::load_from_memory(&mirrored).unwrap().to_rgb8();
        assert!(decoded.get_pixel(0, 8)[0] < 100, "left should now be dark");
        assert!(
            decoded.get_pixel(15, 8)[0] > 150,
            "right should now be bright"
        );
    }

    #[test]
    fn test_minimal_config_applies_defaults() {
        let toml_src = r#"
            [client]
            server_url = "http://127.0.0.1:3000"

            [camera]
            backend = "shell"
        "#;
        let config: ClientConfig = toml::from_str(toml_src).unwrap();

        assert_eq!(config.camera.facing, Facing::Front);
        assert_eq!(config.capture.jpeg_quality, 85);
        assert_eq!(config.capture.warmup_ms, 500);
        assert_eq!(config.capture.location_timeout_secs, 8);
        assert_eq!(config.gallery.limit, 10);
        assert_eq!(config.gallery.refresh_interval_secs, 30);
        assert_eq!(config.location.mode, LocationMode::Off);

        // Front cameras mirror unless the config says otherwise
        assert!(config.capture_options().mirror);
    }

    #[test]
    fn test_rear_config_does_not_mirror() {
        let toml_src = r#"
            [client]
            server_url = "http://127.0.0.1:3000"

            [camera]
            backend = "shell"
            facing = "rear"
        "#;
        let config: ClientConfig = toml::from_str(toml_src).unwrap();
        let options = config.capture_options();

        assert_eq!(options.facing, Facing::Rear);
        assert!(!options.mirror);
    }
}

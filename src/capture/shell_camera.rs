//! # Shell Grabber Camera Backend
//!
//! Drives a real video device through an external frame-grabber command
//! (ffmpeg by default). Devices are discovered through the kernel's
//! video4linux sysfs tree, which exposes one directory per device with a
//! `name` file carrying the vendor label; that label is what the facing
//! heuristic matches against.
//!
//! Each [`CameraStream::grab_frame`] call runs the grabber once, pointing it
//! at a temporary output file, then decodes the result. The grabber command
//! is a template with `{device}`, `{width}`, `{height}` and `{output}`
//! placeholders and runs under `sh -c`.

use async_trait::async_trait;
use image::RgbImage;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::camera::{
    find_candidate, CameraBackend, CameraConstraints, CameraError, CameraInfo, CameraStream,
};

/// Default grabber template: one frame from a v4l2 device via ffmpeg.
pub const DEFAULT_GRAB_COMMAND: &str =
    "ffmpeg -loglevel error -y -f v4l2 -video_size {width}x{height} -i {device} -frames:v 1 {output}";

/// EBUSY, reported when another process is streaming from the device.
const DEVICE_BUSY: i32 = 16;

/// Camera backend that shells out to a frame grabber.
pub struct ShellCamera {
    grab_command: String,
    sysfs_dir: PathBuf,
    device_dir: PathBuf,
}

impl ShellCamera {
    /// Create a backend using the standard Linux discovery paths
    /// (`/sys/class/video4linux` and `/dev`).
    pub fn new(grab_command: impl Into<String>) -> Self {
        Self::with_roots(grab_command, "/sys/class/video4linux", "/dev")
    }

    /// Create a backend with custom discovery roots. Used by tests to point
    /// enumeration at fixture directories.
    pub fn with_roots(
        grab_command: impl Into<String>,
        sysfs_dir: impl Into<PathBuf>,
        device_dir: impl Into<PathBuf>,
    ) -> Self {
        ShellCamera {
            grab_command: grab_command.into(),
            sysfs_dir: sysfs_dir.into(),
            device_dir: device_dir.into(),
        }
    }

    /// Open the device node once to find out whether it is usable, and map
    /// the failure kind onto the camera error taxonomy.
    fn probe_device(path: &Path) -> Result<(), CameraError> {
        match std::fs::OpenOptions::new().read(true).open(path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CameraError::NotFound(format!(
                "{} does not exist",
                path.display()
            ))),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => Err(
                CameraError::PermissionDenied(format!("cannot open {}", path.display())),
            ),
            Err(e) if e.raw_os_error() == Some(DEVICE_BUSY) => Err(CameraError::Busy(format!(
                "{} is held by another process",
                path.display()
            ))),
            Err(e) => Err(CameraError::Backend(format!(
                "cannot open {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn resolve_device(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<PathBuf, CameraError> {
        if let Some(id) = &constraints.device_id {
            return Ok(PathBuf::from(id));
        }

        let devices = self.enumerate().await?;
        if devices.is_empty() {
            return Err(CameraError::NotFound(
                "no video devices present".to_string(),
            ));
        }
        let chosen = match constraints.facing {
            Some(facing) => find_candidate(&devices, facing).unwrap_or(&devices[0]),
            None => &devices[0],
        };
        Ok(PathBuf::from(&chosen.device_id))
    }
}

#[async_trait]
impl CameraBackend for ShellCamera {
    /// List video devices from the sysfs tree, sorted by node name.
    ///
    /// A missing sysfs tree (no camera drivers loaded, containers) yields an
    /// empty list rather than an error.
    async fn enumerate(&self) -> Result<Vec<CameraInfo>, CameraError> {
        let mut dir = match tokio::fs::read_dir(&self.sysfs_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CameraError::Backend(format!(
                    "cannot read {}: {}",
                    self.sysfs_dir.display(),
                    e
                )))
            }
        };

        let mut devices = Vec::new();
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(CameraError::Backend(format!(
                        "cannot read {}: {}",
                        self.sysfs_dir.display(),
                        e
                    )))
                }
            };
            let node = entry.file_name().to_string_lossy().to_string();
            let label = match tokio::fs::read_to_string(entry.path().join("name")).await {
                Ok(name) => name.trim().to_string(),
                Err(_) => node.clone(),
            };
            devices.push(CameraInfo {
                device_id: self.device_dir.join(&node).to_string_lossy().to_string(),
                label,
            });
        }
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(devices)
    }

    async fn open(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        let device = self.resolve_device(constraints).await?;
        Self::probe_device(&device)?;
        debug!("Opened shell camera stream on {}", device.display());
        Ok(Box::new(ShellStream {
            device,
            grab_command: self.grab_command.clone(),
            width: constraints.width,
            height: constraints.height,
            live: true,
        }))
    }
}

/// A stream backed by per-frame grabber invocations.
struct ShellStream {
    device: PathBuf,
    grab_command: String,
    width: u32,
    height: u32,
    live: bool,
}

impl ShellStream {
    fn render_command(&self, output: &Path) -> String {
        self.grab_command
            .replace("{device}", &self.device.to_string_lossy())
            .replace("{width}", &self.width.to_string())
            .replace("{height}", &self.height.to_string())
            .replace("{output}", &output.to_string_lossy())
    }
}

#[async_trait]
impl CameraStream for ShellStream {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn is_live(&self) -> bool {
        self.live
    }

    async fn grab_frame(&mut self) -> Result<RgbImage, CameraError> {
        if !self.live {
            return Err(CameraError::Backend(
                "stream has already been stopped".to_string(),
            ));
        }

        let scratch = tempfile::Builder::new()
            .prefix("geosnap-frame-")
            .suffix(".jpg")
            .tempfile()
            .map_err(|e| CameraError::Backend(format!("cannot create scratch file: {}", e)))?;

        let command = self.render_command(scratch.path());
        debug!("Running frame grabber: {}", command);
        let status = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| CameraError::Backend(format!("cannot run frame grabber: {}", e)))?;
        if !status.success() {
            return Err(CameraError::Backend(format!(
                "frame grabber exited with {}",
                status
            )));
        }

        let bytes = tokio::fs::read(scratch.path())
            .await
            .map_err(|e| CameraError::Backend(format!("cannot read grabbed frame: {}", e)))?;
        let frame = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map(|img| img.to_rgb8())
        })
        .await
        .map_err(|e| CameraError::Backend(format!("frame decode task failed: {}", e)))?
        .map_err(|e| CameraError::Backend(format!("cannot decode grabbed frame: {}", e)))?;
        Ok(frame)
    }

    async fn stop(&mut self) {
        if self.live {
            self.live = false;
            debug!("Released shell camera stream on {}", self.device.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn fixture_device(dir: &Path, node: &str, label: &str) {
        std::fs::create_dir(dir.join(node)).unwrap();
        std::fs::write(dir.join(node).join("name"), format!("{}\n", label)).unwrap();
    }

    #[tokio::test]
    async fn test_enumerate_reads_sysfs_labels() {
        let sysfs = tempfile::tempdir().unwrap();
        let dev = tempfile::tempdir().unwrap();
        fixture_device(sysfs.path(), "video1", "Rear Camera");
        fixture_device(sysfs.path(), "video0", "Front Camera");

        let backend = ShellCamera::with_roots("true", sysfs.path(), dev.path());
        let devices = backend.enumerate().await.unwrap();

        assert_eq!(devices.len(), 2);
        // Sorted by device node, labels trimmed
        assert!(devices[0].device_id.ends_with("video0"));
        assert_eq!(devices[0].label, "Front Camera");
        assert_eq!(devices[1].label, "Rear Camera");
    }

    #[tokio::test]
    async fn test_enumerate_missing_sysfs_is_empty() {
        let backend =
            ShellCamera::with_roots("true", "/definitely/not/a/real/sysfs", "/tmp");
        assert!(backend.enumerate().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_unknown_device_is_not_found() {
        let backend = ShellCamera::new("true");
        let err = backend
            .open(&CameraConstraints::exact(
                "/definitely/not/a/device",
                crate::capture::Facing::Front,
                640,
                480,
            ))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CameraError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_open_with_no_devices_is_not_found() {
        let sysfs = tempfile::tempdir().unwrap();
        let dev = tempfile::tempdir().unwrap();
        let backend = ShellCamera::with_roots("true", sysfs.path(), dev.path());
        let err = backend
            .open(&CameraConstraints::any(640, 480))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CameraError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_grab_frame_through_grabber_command() {
        // The "device" is a real JPEG on disk and the grabber just copies it,
        // which exercises the whole template/spawn/decode pipeline.
        let sysfs = tempfile::tempdir().unwrap();
        let dev = tempfile::tempdir().unwrap();
        fixture_device(sysfs.path(), "video0", "Front Camera");

        let mut jpeg = Vec::new();
        let img = RgbImage::from_pixel(8, 6, Rgb([10, 200, 30]));
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90)
            .encode_image(&img)
            .unwrap();
        std::fs::write(dev.path().join("video0"), &jpeg).unwrap();

        let backend = ShellCamera::with_roots("cp {device} {output}", sysfs.path(), dev.path());
        let mut stream = backend
            .open(&CameraConstraints::facing_only(
                crate::capture::Facing::Front,
                8,
                6,
            ))
            .await
            .unwrap();
        assert!(stream.is_live());

        let frame = stream.grab_frame().await.unwrap();
        assert_eq!(frame.dimensions(), (8, 6));

        stream.stop().await;
        assert!(!stream.is_live());
        assert!(stream.grab_frame().await.is_err());
    }
}

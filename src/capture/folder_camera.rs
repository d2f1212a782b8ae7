//! # Folder Camera Backend
//!
//! Replays still images from a directory as if they were camera frames. Each
//! image file is one "device": its stem is the device label, so a directory
//! containing `front-desk.jpg` and `back-yard.jpg` exercises the same facing
//! heuristic a real device list would. Useful for demos and machines without
//! a capture device.

use async_trait::async_trait;
use image::RgbImage;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::camera::{
    find_candidate, CameraBackend, CameraConstraints, CameraError, CameraInfo, CameraStream,
};

const FRAME_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Camera backend that serves frames from image files in a directory.
pub struct FolderCamera {
    frames_dir: PathBuf,
}

impl FolderCamera {
    pub fn new(frames_dir: impl Into<PathBuf>) -> Self {
        FolderCamera {
            frames_dir: frames_dir.into(),
        }
    }

    fn is_frame_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    async fn load_frame(path: &Path) -> Result<RgbImage, CameraError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CameraError::NotFound(format!(
                    "{} does not exist",
                    path.display()
                )))
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(CameraError::PermissionDenied(format!(
                    "cannot read {}",
                    path.display()
                )))
            }
            Err(e) => {
                return Err(CameraError::Backend(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map(|img| img.to_rgb8())
        })
        .await
        .map_err(|e| CameraError::Backend(format!("frame decode task failed: {}", e)))?
        .map_err(|e| CameraError::Backend(format!("cannot decode frame: {}", e)))
    }
}

#[async_trait]
impl CameraBackend for FolderCamera {
    async fn enumerate(&self) -> Result<Vec<CameraInfo>, CameraError> {
        let mut dir = match tokio::fs::read_dir(&self.frames_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CameraError::Backend(format!(
                    "cannot read {}: {}",
                    self.frames_dir.display(),
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
                        self.frames_dir.display(),
                        e
                    )))
                }
            };
            let path = entry.path();
            if !Self::is_frame_file(&path) {
                continue;
            }
            let label = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default();
            devices.push(CameraInfo {
                device_id: path.to_string_lossy().to_string(),
                label,
            });
        }
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(devices)
    }

    /// Open a frame file as a stream. The image is decoded eagerly so the
    /// stream can report its real resolution.
    async fn open(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        let path = if let Some(id) = &constraints.device_id {
            PathBuf::from(id)
        } else {
            let devices = self.enumerate().await?;
            if devices.is_empty() {
                return Err(CameraError::NotFound(format!(
                    "no frame files in {}",
                    self.frames_dir.display()
                )));
            }
            let chosen = match constraints.facing {
                Some(facing) => find_candidate(&devices, facing).unwrap_or(&devices[0]),
                None => &devices[0],
            };
            PathBuf::from(&chosen.device_id)
        };

        let frame = Self::load_frame(&path).await?;
        debug!("Opened folder camera stream on {}", path.display());
        Ok(Box::new(FolderStream {
            frame: Some(frame),
        }))
    }
}

struct FolderStream {
    /// The decoded frame; `None` once the stream has been stopped.
    frame: Option<RgbImage>,
}

#[async_trait]
impl CameraStream for FolderStream {
    fn resolution(&self) -> (u32, u32) {
        self.frame
            .as_ref()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0))
    }

    fn is_live(&self) -> bool {
        self.frame.is_some()
    }

    async fn grab_frame(&mut self) -> Result<RgbImage, CameraError> {
        match &self.frame {
            Some(frame) => Ok(frame.clone()),
            None => Err(CameraError::Backend(
                "stream has already been stopped".to_string(),
            )),
        }
    }

    async fn stop(&mut self) {
        if self.frame.take().is_some() {
            debug!("Released folder camera stream");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Facing;
    use image::Rgb;

    fn write_frame(dir: &Path, name: &str, width: u32, height: u32) {
        let img = RgbImage::from_pixel(width, height, Rgb([128, 64, 32]));
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90)
            .encode_image(&img)
            .unwrap();
        std::fs::write(dir.join(name), &jpeg).unwrap();
    }

    #[tokio::test]
    async fn test_enumerate_uses_file_stems_as_labels() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "back-yard.jpg", 4, 4);
        write_frame(dir.path(), "front-desk.jpg", 4, 4);
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let backend = FolderCamera::new(dir.path());
        let devices = backend.enumerate().await.unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].label, "back-yard");
        assert_eq!(devices[1].label, "front-desk");
    }

    #[tokio::test]
    async fn test_open_prefers_matching_facing() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "back-yard.jpg", 4, 4);
        write_frame(dir.path(), "front-desk.jpg", 6, 2);

        let backend = FolderCamera::new(dir.path());
        let stream = backend
            .open(&CameraConstraints::facing_only(Facing::Front, 640, 480))
            .await
            .unwrap();
        // front-desk.jpg is 6x2, so the facing heuristic picked it
        assert_eq!(stream.resolution(), (6, 2));
    }

    #[tokio::test]
    async fn test_empty_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FolderCamera::new(dir.path());
        let err = backend
            .open(&CameraConstraints::any(640, 480))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CameraError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stop_releases_the_frame() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "front-desk.jpg", 4, 4);

        let backend = FolderCamera::new(dir.path());
        let mut stream = backend
            .open(&CameraConstraints::any(640, 480))
            .await
            .unwrap();
        assert!(stream.grab_frame().await.is_ok());

        stream.stop().await;
        assert!(!stream.is_live());
        assert!(stream.grab_frame().await.is_err());
    }
}

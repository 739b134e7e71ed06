use crate::error::CaptureError;
use crate::frame;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A live camera feed.
///
/// Readers call `is_ready` and `capture`. Only the owner of the session
/// calls `release`, once, when the session ends.
pub trait CaptureDevice: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the feed currently has a frame to give.
    fn is_ready(&self) -> bool;

    /// One JPEG encoded frame, or `None` if the feed has nothing right now.
    fn capture(&self) -> Option<Vec<u8>>;

    /// Stops the feed. Further captures return `None`.
    fn release(&self);
}

/// Grants access to a camera, the way a permission prompt would.
#[async_trait]
pub trait CameraProvider: Send + Sync {
    async fn acquire(&self) -> Result<Arc<dyn CaptureDevice>, CaptureError>;
}

/// A camera that serves the same still JPEG for every capture.
///
/// Used on terminals and in tests where no real webcam is attached.
pub struct StillFrameCamera {
    name: String,
    jpeg: Vec<u8>,
    released: AtomicBool,
}

impl StillFrameCamera {
    pub fn new(name: &str, jpeg: Vec<u8>) -> Result<Self, CaptureError> {
        if !frame::is_jpeg(&jpeg) {
            return Err(CaptureError::Camera(format!("{name} is not a JPEG image")));
        }
        Ok(Self {
            name: name.to_string(),
            jpeg,
            released: AtomicBool::new(false),
        })
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl CaptureDevice for StillFrameCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        !self.is_released()
    }

    fn capture(&self) -> Option<Vec<u8>> {
        if self.is_released() {
            return None;
        }
        Some(self.jpeg.clone())
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            tracing::info!("camera released: {}", self.name);
        }
    }
}

/// Opens a [`StillFrameCamera`] from a JPEG file on each `acquire`.
pub struct FileCameraProvider {
    path: PathBuf,
}

impl FileCameraProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CameraProvider for FileCameraProvider {
    async fn acquire(&self) -> Result<Arc<dyn CaptureDevice>, CaptureError> {
        let jpeg = tokio::fs::read(&self.path)
            .await
            .map_err(CaptureError::from_camera_io)?;
        let camera = StillFrameCamera::new(&self.path.display().to_string(), jpeg)?;
        tracing::info!("camera acquired: {}", camera.name());
        Ok(Arc::new(camera))
    }
}

/// Provider used when no camera is configured at all.
pub struct NoCamera;

#[async_trait]
impl CameraProvider for NoCamera {
    async fn acquire(&self) -> Result<Arc<dyn CaptureDevice>, CaptureError> {
        Err(CaptureError::CameraNotFound)
    }
}

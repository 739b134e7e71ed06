/// Why a local capture could not be used.
///
/// The display strings are the messages shown to the candidate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("Camera permission denied.")]
    CameraPermissionDenied,
    #[error("No camera found.")]
    CameraNotFound,
    #[error("Camera is in use.")]
    CameraInUse,
    #[error("Camera error: {0}")]
    Camera(String),
    #[error("Speech recognition not supported.")]
    SpeechUnsupported,
    #[error("Speech error: {0}")]
    Speech(String),
}

impl CaptureError {
    pub(crate) fn from_camera_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => CaptureError::CameraNotFound,
            std::io::ErrorKind::PermissionDenied => CaptureError::CameraPermissionDenied,
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::ResourceBusy => {
                CaptureError::CameraInUse
            }
            _ => CaptureError::Camera(err.to_string()),
        }
    }
}

//! Local capture collaborators: the camera feed and single-shot speech input.

pub mod device;
mod error;
pub mod frame;
pub mod speech;

pub use device::{CameraProvider, CaptureDevice, FileCameraProvider, NoCamera, StillFrameCamera};
pub use error::CaptureError;
pub use speech::{ChannelRecognizer, SpeechRecognizer};

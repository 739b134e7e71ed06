use crate::error::CaptureError;
use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

/// Single-shot speech-to-text: each call yields one final transcript.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn listen(&self) -> Result<String, CaptureError>;
}

/// Recognizer fed by an external transcriber through a channel.
///
/// Each `listen` takes the next final utterance pushed on the sender side.
/// Blank utterances are reported as "no-speech", matching what a browser
/// recognizer does on silence.
pub struct ChannelRecognizer {
    rx: Mutex<mpsc::Receiver<String>>,
}

impl ChannelRecognizer {
    pub fn new(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx: Mutex::new(rx) })
    }
}

#[async_trait]
impl SpeechRecognizer for ChannelRecognizer {
    async fn listen(&self) -> Result<String, CaptureError> {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(text) if text.trim().is_empty() => Err(CaptureError::Speech("no-speech".into())),
            Some(text) => Ok(text.trim().to_string()),
            None => Err(CaptureError::SpeechUnsupported),
        }
    }
}

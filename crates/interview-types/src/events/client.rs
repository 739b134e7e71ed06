/// `{"image": "<data url>"}` frame sample sent to the proctor.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FrameEvent {
    /// Encoded frame, as a `data:image/jpeg;base64,...` URL.
    image: String,
}

impl FrameEvent {
    pub fn new(image: String) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &str {
        &self.image
    }
}

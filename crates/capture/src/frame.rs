use base64::Engine;

/// Prefix the proctor strips before decoding a frame.
pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Checks for the JPEG start-of-image marker.
pub fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.starts_with(&JPEG_SOI)
}

/// Encodes JPEG bytes as the data URL the proctoring channel carries.
pub fn encode_data_url(jpeg: &[u8]) -> String {
    let mut url = String::with_capacity(JPEG_DATA_URL_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    url.push_str(JPEG_DATA_URL_PREFIX);
    base64::engine::general_purpose::STANDARD.encode_string(jpeg, &mut url);
    url
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventsError {
    #[error("malformed session json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image data of {width}x{height} needs {expected} bytes, got {actual}")]
    ImageDataSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

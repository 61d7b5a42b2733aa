//! Uploaded image payloads

use serde::{Deserialize, Serialize};

/// One uploaded photograph of the cabinet contents
///
/// The payload is opaque to this service: it is forwarded to the inference
/// provider without being decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUpload {
    /// Base64-encoded image bytes
    pub data_base64: String,
    /// Declared MIME type, e.g. "image/jpeg"
    pub content_type: String,
}

impl ImageUpload {
    pub fn is_empty(&self) -> bool {
        self.data_base64.trim().is_empty()
    }
}

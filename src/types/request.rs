//! Prediction request data structures

use crate::error::PredictError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// A prediction request carrying one base64-encoded image, with or without a
/// `data:image/...;base64,` prefix as browsers produce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub image: String,
}

impl PredictRequest {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    /// Decode the payload into raw image bytes, stripping any data-URI header.
    pub fn image_bytes(&self) -> Result<Vec<u8>, PredictError> {
        let encoded = match self.image.split_once(',') {
            Some((_header, encoded)) => encoded,
            None => self.image.as_str(),
        };

        STANDARD
            .decode(encoded)
            .map_err(|e| PredictError::ImageDecode(format!("invalid base64 payload: {e}")))
    }
}

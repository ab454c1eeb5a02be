//! Typed errors for the prediction path.
//!
//! Setup-time failures (model loading, configuration) use `anyhow` with
//! context; everything that can fail while serving a single request is
//! enumerated here so callers can distinguish the failing stage.

use thiserror::Error;

/// Errors produced while serving a single prediction request.
#[derive(Debug, Error)]
pub enum PredictError {
    /// The request payload could not be decoded into an RGB image.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// A classification head failed to produce a valid probability vector.
    #[error("model '{model}' produced an invalid probability vector: {reason}")]
    ModelEvaluation { model: String, reason: String },

    /// The probability matrix handed to the aggregator has the wrong shape.
    /// This indicates a configuration or programming error, not bad input.
    #[error("invalid probability matrix shape: {0}")]
    InvalidInputShape(String),
}

impl PredictError {
    pub fn model_evaluation(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ModelEvaluation {
            model: model.into(),
            reason: reason.into(),
        }
    }
}

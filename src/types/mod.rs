//! Type definitions for the gesture recognition pipeline

pub mod prediction;
pub mod request;

pub use prediction::{ErrorMessage, GestureMessage, PredictionResult};
pub use request::PredictRequest;

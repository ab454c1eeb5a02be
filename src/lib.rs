//! Gesture Ensemble Pipeline Library
//!
//! Real-time hand gesture recognition combining several independently
//! trained classifiers with Dirichlet moment-matching confidence estimation.

pub mod config;
pub mod consumer;
pub mod error;
pub mod metrics;
pub mod models;
pub mod predictor;
pub mod preprocess;
pub mod producer;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::PredictError;
pub use models::aggregator::{DirichletAggregator, DirichletEstimate};
pub use models::ensemble::{ClassificationHead, EnsembleRunner, ProbabilityMatrix};
pub use predictor::GesturePredictor;
pub use preprocess::Preprocessor;
pub use producer::ResultPublisher;
pub use types::{GestureMessage, PredictRequest, PredictionResult};

//! Prediction façade: decode → preprocess → ensemble → aggregate

use crate::config::AppConfig;
use crate::error::PredictError;
use crate::models::aggregator::DirichletAggregator;
use crate::models::ensemble::EnsembleRunner;
use crate::models::loader::ModelLoader;
use crate::preprocess::Preprocessor;
use crate::types::prediction::PredictionResult;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

/// Single entry point for turning raw image bytes into a gesture prediction.
///
/// Holds no mutable state between calls; every request's intermediate data is
/// scoped to that request, so one predictor can be shared across concurrent
/// requests.
pub struct GesturePredictor {
    preprocessor: Preprocessor,
    runner: EnsembleRunner,
    aggregator: DirichletAggregator,
}

impl GesturePredictor {
    pub fn new(
        preprocessor: Preprocessor,
        runner: EnsembleRunner,
        aggregator: DirichletAggregator,
    ) -> Self {
        Self {
            preprocessor,
            runner,
            aggregator,
        }
    }

    /// Build a predictor from configuration, loading every configured head.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.models.onnx_threads)?;
        let heads = loader
            .load_heads(&config.models.models_dir, &config.models.heads)
            .context("Failed to load ensemble heads")?;

        let runner = EnsembleRunner::new(heads, config.models.num_classes);
        info!(
            ensemble_size = runner.ensemble_size(),
            num_classes = config.models.num_classes,
            "Gesture predictor initialized"
        );

        Ok(Self::new(
            Preprocessor::new(config.models.input_size),
            runner,
            DirichletAggregator::new(&config.aggregation),
        ))
    }

    pub fn ensemble_size(&self) -> usize {
        self.runner.ensemble_size()
    }

    pub fn head_names(&self) -> Vec<&str> {
        self.runner.head_names()
    }

    /// Run the full pipeline on raw image bytes.
    ///
    /// Decode failures surface as `ImageDecode`; runner and aggregator errors
    /// propagate unchanged. There is no fallback prediction.
    pub fn predict(&self, image_bytes: &[u8]) -> Result<PredictionResult, PredictError> {
        let input = self.preprocessor.decode_and_transform(image_bytes)?;
        let matrix = self.runner.evaluate(&input)?;
        let estimate = self.aggregator.fit(&matrix)?;

        let probabilities = estimate.expected_probabilities();
        let class_index = argmax(&probabilities);

        debug!(
            class_index = class_index,
            confidence = estimate.alpha0,
            "Prediction complete"
        );

        Ok(PredictionResult {
            class_index,
            probabilities,
            confidence: estimate.alpha0,
        })
    }

    /// Predict from an image file on disk.
    pub fn predict_file<P: AsRef<Path>>(&self, path: P) -> Result<PredictionResult, PredictError> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| PredictError::ImageDecode(format!("cannot read image file: {e}")))?;
        self.predict(&bytes)
    }
}

/// Index of the largest entry, ties broken by lowest index.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

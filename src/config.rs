//! Configuration management for the gesture recognition pipeline

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming prediction requests
    pub request_subject: String,
    /// Subject for outgoing predictions, used when a request carries no
    /// reply subject
    pub result_subject: String,
}

/// Ensemble model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing ONNX checkpoint exports
    pub models_dir: String,
    /// Head architectures to load, by name. Order fixes the row order of the
    /// probability matrix.
    #[serde(default = "default_heads")]
    pub heads: Vec<String>,
    /// Number of gesture classes the heads were trained on
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
    /// Input image side length after resize and center crop
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    /// Number of threads for ONNX inference per head (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_heads() -> Vec<String> {
    vec![
        "vgg16".to_string(),
        "vgg19".to_string(),
        "mobilenet".to_string(),
        "mobilenet_v2".to_string(),
    ]
}

fn default_num_classes() -> usize {
    14
}

fn default_input_size() -> u32 {
    256
}

fn default_onnx_threads() -> usize {
    1
}

/// Dirichlet moment-matching configuration.
///
/// Both floors come from the original estimator and are load-bearing: the
/// variance floor prevents division by zero when the ensemble is unanimous,
/// the concentration floor keeps α₀ positive when the per-class estimates
/// are negative or non-finite.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "default_variance_floor")]
    pub variance_floor: f64,
    #[serde(default = "default_concentration_floor")]
    pub concentration_floor: f64,
}

fn default_variance_floor() -> f64 {
    1e-8
}

fn default_concentration_floor() -> f64 {
    1e-6
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            variance_floor: default_variance_floor(),
            concentration_floor: default_concentration_floor(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrent prediction workers
    pub workers: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "gesture.predict".to_string(),
                result_subject: "gesture.predictions".to_string(),
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                heads: default_heads(),
                num_classes: default_num_classes(),
                input_size: default_input_size(),
                onnx_threads: 1,
            },
            aggregation: AggregationConfig::default(),
            pipeline: PipelineConfig { workers: 4 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

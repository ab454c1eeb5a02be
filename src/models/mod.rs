//! Ensemble model components

pub mod aggregator;
pub mod ensemble;
pub mod loader;

pub use aggregator::{DirichletAggregator, DirichletEstimate};
pub use ensemble::{ClassificationHead, EnsembleRunner, ProbabilityMatrix};
pub use loader::ModelLoader;

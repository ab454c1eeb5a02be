//! ONNX gesture head loader

use crate::models::ensemble::ClassificationHead;
use anyhow::{bail, Context, Result};
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// The closed set of head architectures the ensemble was trained with.
/// Selection happens by name at load time; at inference time all variants
/// are interchangeable behind [`ClassificationHead`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadArchitecture {
    Vgg16,
    Vgg19,
    MobileNetV3Large,
    MobileNetV2,
}

impl HeadArchitecture {
    /// Resolve an architecture from its configured name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "vgg16" => Ok(Self::Vgg16),
            "vgg19" => Ok(Self::Vgg19),
            "mobilenet" => Ok(Self::MobileNetV3Large),
            "mobilenet_v2" => Ok(Self::MobileNetV2),
            other => bail!("Unknown head architecture: {other}"),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Vgg16 => "vgg16",
            Self::Vgg19 => "vgg19",
            Self::MobileNetV3Large => "mobilenet",
            Self::MobileNetV2 => "mobilenet_v2",
        }
    }

    /// Checkpoint file name under the models directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Vgg16 => "gesture_vgg16.onnx",
            Self::Vgg19 => "gesture_vgg19.onnx",
            Self::MobileNetV3Large => "gesture_mobilenet.onnx",
            Self::MobileNetV2 => "gesture_mobilenet_v2.onnx",
        }
    }
}

/// A loaded gesture head backed by an ONNX Runtime session.
///
/// The exported nets emit raw logits; the head applies softmax itself so it
/// fulfils the probability-vector contract of [`ClassificationHead`].
pub struct OnnxHead {
    name: String,
    /// ONNX Runtime sessions need `&mut` to run, so the session sits behind
    /// a mutex even though the head is logically read-only.
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl ClassificationHead for OnnxHead {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, input: &Array4<f32>) -> Result<Vec<f32>> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = input.iter().copied().collect();
        let input_tensor =
            Tensor::from_array((shape, data)).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Session lock poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        let output = outputs
            .get(&self.output_name)
            .or_else(|| outputs.keys().next().and_then(|k| outputs.get(k)))
            .context("Model produced no outputs")?;

        let (out_shape, out_data) = output.try_extract_tensor::<f32>()?;
        let dims: Vec<i64> = out_shape.iter().copied().collect();
        let logits: &[f32] = match dims.as_slice() {
            // [1, num_classes] with batch size 1, or a flat [num_classes]
            [1, _] | [_] => out_data,
            other => bail!("Unexpected output shape {:?}", other),
        };

        Ok(softmax(logits))
    }
}

/// Numerically stable softmax over a logit slice.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

/// Loader for the ensemble's ONNX checkpoints
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread)
    pub fn new() -> Result<Self> {
        Self::with_threads(1)
    }

    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load a single gesture head from file
    pub fn load_head<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<OnnxHead> {
        let path = path.as_ref();

        info!(head = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX head");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load head from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "input".to_string());

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "logits".to_string());

        info!(
            head = %name,
            input = %input_name,
            output = %output_name,
            "Head loaded successfully"
        );

        Ok(OnnxHead {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    /// Load every configured head from a directory, in configuration order.
    ///
    /// Any unknown name or unreadable checkpoint aborts loading. A silently
    /// skipped head would change the ensemble size, which the moment-matching
    /// estimator is sensitive to.
    pub fn load_heads<P: AsRef<Path>>(
        &self,
        models_dir: P,
        names: &[String],
    ) -> Result<Vec<Box<dyn ClassificationHead>>> {
        let models_dir = models_dir.as_ref();

        if names.is_empty() {
            bail!("No heads configured");
        }

        let mut heads: Vec<Box<dyn ClassificationHead>> = Vec::with_capacity(names.len());
        for name in names {
            let architecture = HeadArchitecture::from_name(name)?;
            let path = models_dir.join(architecture.file_name());
            let head = self
                .load_head(&path, architecture.name())
                .context(format!("Failed to load head '{name}'"))?;
            heads.push(Box::new(head));
        }

        info!(
            count = heads.len(),
            "Loaded {} heads from {}",
            heads.len(),
            models_dir.display()
        );

        Ok(heads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_from_name() {
        assert_eq!(
            HeadArchitecture::from_name("vgg16").unwrap(),
            HeadArchitecture::Vgg16
        );
        assert_eq!(
            HeadArchitecture::from_name("mobilenet_v2").unwrap(),
            HeadArchitecture::MobileNetV2
        );
        assert!(HeadArchitecture::from_name("resnet50").is_err());
    }

    #[test]
    fn test_architecture_file_names() {
        assert_eq!(HeadArchitecture::Vgg19.file_name(), "gesture_vgg19.onnx");
        assert_eq!(
            HeadArchitecture::MobileNetV3Large.file_name(),
            "gesture_mobilenet.onnx"
        );
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_handles_large_logits() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!(probs.iter().all(|p| p.is_finite()));
    }
}

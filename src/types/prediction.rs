//! Prediction result data structures

use serde::{Deserialize, Serialize};

/// Outcome of one prediction: the winning class, the expected class
/// distribution and the fitted total concentration as confidence.
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    /// Index of the predicted gesture class (argmax of the expected
    /// distribution, ties broken by lowest index)
    pub class_index: usize,
    /// Expected class distribution, length K
    pub probabilities: Vec<f64>,
    /// Total concentration α₀ of the fitted Dirichlet
    pub confidence: f64,
}

impl PredictionResult {
    /// Human-readable gesture label
    pub fn label(&self) -> String {
        format!("Gesture_{}", self.class_index)
    }

    /// Convert to the wire message published to clients
    pub fn to_message(&self) -> GestureMessage {
        GestureMessage {
            prediction: self.label(),
            confidence: self.confidence,
            probabilities: self.probabilities.clone(),
        }
    }
}

/// Wire format for a successful prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureMessage {
    /// Gesture label, e.g. "Gesture_3"
    pub prediction: String,
    /// Total concentration α₀
    pub confidence: f64,
    /// Expected class distribution
    pub probabilities: Vec<f64>,
}

/// Wire format for a failed prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
}

impl ErrorMessage {
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_format() {
        let result = PredictionResult {
            class_index: 3,
            probabilities: vec![0.0, 0.1, 0.2, 0.7],
            confidence: 12.5,
        };
        assert_eq!(result.label(), "Gesture_3");
    }

    #[test]
    fn test_message_serialization_shape() {
        let result = PredictionResult {
            class_index: 0,
            probabilities: vec![0.9, 0.1],
            confidence: 42.0,
        };

        let json = serde_json::to_value(result.to_message()).unwrap();
        assert_eq!(json["prediction"], "Gesture_0");
        assert_eq!(json["confidence"], 42.0);
        assert_eq!(json["probabilities"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_message_round_trip() {
        let message = GestureMessage {
            prediction: "Gesture_7".to_string(),
            confidence: 1.5,
            probabilities: vec![0.25; 4],
        };

        let json = serde_json::to_string(&message).unwrap();
        let deserialized: GestureMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(message.prediction, deserialized.prediction);
        assert_eq!(message.confidence, deserialized.confidence);
    }
}

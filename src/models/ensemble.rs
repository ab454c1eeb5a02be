//! Ensemble evaluation of gesture classification heads

use crate::error::PredictError;
use ndarray::Array4;
use tracing::debug;

/// Tolerance for a head's probability vector summing to 1.
pub const PROB_SUM_TOLERANCE: f32 = 1e-4;

/// One classification head: evaluates a preprocessed image tensor into a
/// probability vector over the gesture classes. Implementations must not
/// mutate per-request state; heads are shared read-only across requests.
pub trait ClassificationHead: Send + Sync {
    fn name(&self) -> &str;

    /// Evaluate an NCHW `(1, 3, S, S)` tensor into a length-K probability
    /// vector (non-negative, summing to 1).
    fn evaluate(&self, input: &Array4<f32>) -> anyhow::Result<Vec<f32>>;
}

/// Request-scoped M×K matrix of per-head probability vectors, row order
/// matching head insertion order. Created fresh per prediction and discarded
/// after aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMatrix {
    num_classes: usize,
    rows: Vec<Vec<f64>>,
}

impl ProbabilityMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            rows: Vec::new(),
        }
    }

    /// Build a matrix from prepared rows; every row must have the same width.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, PredictError> {
        let num_classes = rows
            .first()
            .map(|r| r.len())
            .ok_or_else(|| PredictError::InvalidInputShape("matrix has no rows".to_string()))?;
        let mut matrix = Self::new(num_classes);
        for row in rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    /// Append one head's probability vector.
    pub fn push_row(&mut self, row: Vec<f64>) -> Result<(), PredictError> {
        if row.len() != self.num_classes {
            return Err(PredictError::InvalidInputShape(format!(
                "row has {} entries, expected {}",
                row.len(),
                self.num_classes
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Ensemble size M
    pub fn ensemble_size(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }
}

/// Holds the fixed, named set of classification heads and evaluates all of
/// them on a single input. Heads are loaded once at startup and never mutated
/// per request.
pub struct EnsembleRunner {
    heads: Vec<Box<dyn ClassificationHead>>,
    num_classes: usize,
}

impl EnsembleRunner {
    pub fn new(heads: Vec<Box<dyn ClassificationHead>>, num_classes: usize) -> Self {
        Self { heads, num_classes }
    }

    pub fn ensemble_size(&self) -> usize {
        self.heads.len()
    }

    pub fn head_names(&self) -> Vec<&str> {
        self.heads.iter().map(|h| h.name()).collect()
    }

    /// Evaluate every head on one preprocessed input, stacking the results
    /// in head insertion order.
    ///
    /// Any head that fails, or returns a vector of the wrong length, with
    /// non-finite or negative entries, or not summing to 1 within
    /// [`PROB_SUM_TOLERANCE`], aborts the whole evaluation. Dropping a member
    /// would bias the moment-matching variance estimate, so there is no
    /// partial result.
    pub fn evaluate(&self, input: &Array4<f32>) -> Result<ProbabilityMatrix, PredictError> {
        let mut matrix = ProbabilityMatrix::new(self.num_classes);

        for head in &self.heads {
            let probs = head
                .evaluate(input)
                .map_err(|e| PredictError::model_evaluation(head.name(), e.to_string()))?;

            Self::validate_probabilities(head.name(), &probs, self.num_classes)?;

            debug!(head = %head.name(), "Head evaluated");
            matrix.push_row(probs.iter().map(|&p| p as f64).collect())?;
        }

        Ok(matrix)
    }

    fn validate_probabilities(
        name: &str,
        probs: &[f32],
        num_classes: usize,
    ) -> Result<(), PredictError> {
        if probs.len() != num_classes {
            return Err(PredictError::model_evaluation(
                name,
                format!("expected {} classes, got {}", num_classes, probs.len()),
            ));
        }

        if probs.iter().any(|p| !p.is_finite()) {
            return Err(PredictError::model_evaluation(
                name,
                "non-finite probability entry",
            ));
        }

        if probs.iter().any(|&p| p < 0.0) {
            return Err(PredictError::model_evaluation(
                name,
                "negative probability entry",
            ));
        }

        let sum: f32 = probs.iter().sum();
        if (sum - 1.0).abs() > PROB_SUM_TOLERANCE {
            return Err(PredictError::model_evaluation(
                name,
                format!("probabilities sum to {sum}, expected 1"),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHead {
        name: String,
        output: Vec<f32>,
    }

    impl FixedHead {
        fn new(name: &str, output: Vec<f32>) -> Box<dyn ClassificationHead> {
            Box::new(Self {
                name: name.to_string(),
                output,
            })
        }
    }

    impl ClassificationHead for FixedHead {
        fn name(&self) -> &str {
            &self.name
        }

        fn evaluate(&self, _input: &Array4<f32>) -> anyhow::Result<Vec<f32>> {
            Ok(self.output.clone())
        }
    }

    struct FailingHead;

    impl ClassificationHead for FailingHead {
        fn name(&self) -> &str {
            "failing"
        }

        fn evaluate(&self, _input: &Array4<f32>) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("session exploded")
        }
    }

    fn input() -> Array4<f32> {
        Array4::zeros((1, 3, 4, 4))
    }

    #[test]
    fn test_rows_follow_insertion_order() {
        let runner = EnsembleRunner::new(
            vec![
                FixedHead::new("a", vec![0.9, 0.1]),
                FixedHead::new("b", vec![0.2, 0.8]),
            ],
            2,
        );

        let matrix = runner.evaluate(&input()).unwrap();
        assert_eq!(matrix.ensemble_size(), 2);
        assert_eq!(matrix.rows()[0], vec![0.9f32 as f64, 0.1f32 as f64]);
        assert_eq!(matrix.rows()[1], vec![0.2f32 as f64, 0.8f32 as f64]);
    }

    #[test]
    fn test_head_failure_aborts_evaluation() {
        let runner = EnsembleRunner::new(
            vec![FixedHead::new("a", vec![0.5, 0.5]), Box::new(FailingHead)],
            2,
        );

        let err = runner.evaluate(&input()).unwrap_err();
        assert!(matches!(
            err,
            PredictError::ModelEvaluation { ref model, .. } if model == "failing"
        ));
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        let runner = EnsembleRunner::new(vec![FixedHead::new("a", vec![0.5, 0.3, 0.2])], 2);
        let err = runner.evaluate(&input()).unwrap_err();
        assert!(matches!(err, PredictError::ModelEvaluation { .. }));
    }

    #[test]
    fn test_vector_not_summing_to_one_is_rejected() {
        let runner = EnsembleRunner::new(vec![FixedHead::new("a", vec![0.5, 0.4])], 2);
        let err = runner.evaluate(&input()).unwrap_err();
        assert!(matches!(err, PredictError::ModelEvaluation { .. }));
    }

    #[test]
    fn test_non_finite_output_is_rejected() {
        let runner = EnsembleRunner::new(vec![FixedHead::new("a", vec![f32::NAN, 1.0])], 2);
        let err = runner.evaluate(&input()).unwrap_err();
        assert!(matches!(err, PredictError::ModelEvaluation { .. }));
    }

    #[test]
    fn test_negative_entry_is_rejected() {
        let runner = EnsembleRunner::new(vec![FixedHead::new("a", vec![-0.1, 1.1])], 2);
        let err = runner.evaluate(&input()).unwrap_err();
        assert!(matches!(err, PredictError::ModelEvaluation { .. }));
    }

    #[test]
    fn test_matrix_rejects_ragged_row() {
        let mut matrix = ProbabilityMatrix::new(3);
        matrix.push_row(vec![0.2, 0.3, 0.5]).unwrap();
        let err = matrix.push_row(vec![0.5, 0.5]).unwrap_err();
        assert!(matches!(err, PredictError::InvalidInputShape(_)));
    }
}

//! Dirichlet moment-matching aggregation for the gesture ensemble

use crate::config::AggregationConfig;
use crate::error::PredictError;
use crate::models::ensemble::ProbabilityMatrix;

/// Result of fitting a Dirichlet distribution to the ensemble's opinions.
///
/// `alpha` is the concentration vector (all entries non-negative) and
/// `alpha0` its sum. `alpha / alpha0` is a valid probability distribution and
/// equals the ensemble's mean probability vector; `alpha0` carries the
/// confidence signal only, not the ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletEstimate {
    pub alpha: Vec<f64>,
    pub alpha0: f64,
}

impl DirichletEstimate {
    /// Expected class distribution `alpha / alpha0`.
    pub fn expected_probabilities(&self) -> Vec<f64> {
        self.alpha.iter().map(|&a| a / self.alpha0).collect()
    }
}

/// Fits a Dirichlet distribution to an M×K probability matrix by matching
/// the distribution's mean/variance relationship to the sample moments.
///
/// The method needs no training data or hyperparameters, only the ensemble's
/// own disagreement: low variance across heads yields a large total
/// concentration (high confidence), strong disagreement shrinks it toward
/// the configured floor.
#[derive(Debug, Clone)]
pub struct DirichletAggregator {
    /// Added to every per-class variance so a unanimous ensemble does not
    /// divide by zero.
    variance_floor: f64,
    /// Lower bound on α₀, applied when the per-class estimates are negative
    /// or non-finite.
    concentration_floor: f64,
}

impl DirichletAggregator {
    pub fn new(config: &AggregationConfig) -> Self {
        Self {
            variance_floor: config.variance_floor,
            concentration_floor: config.concentration_floor,
        }
    }

    /// Fit a Dirichlet estimate to the stacked head outputs.
    ///
    /// For a Dirichlet-distributed probability vector,
    /// `Var(p_k) = m_k(1-m_k)/(α₀+1)`, so each class yields an estimate
    /// `S_k = m_k(1-m_k)/v_k - 1` of the total concentration. α₀ is the mean
    /// of those per-class estimates, floored to stay positive, and
    /// `α_k = m_k·α₀`.
    ///
    /// Deterministic: the same matrix always produces bit-identical output.
    pub fn fit(&self, matrix: &ProbabilityMatrix) -> Result<DirichletEstimate, PredictError> {
        let m = matrix.ensemble_size();
        let k = matrix.num_classes();

        if m == 0 || k == 0 {
            return Err(PredictError::InvalidInputShape(format!(
                "matrix is {m}x{k}, need at least one row and one class"
            )));
        }
        // push_row keeps the matrix rectangular, but a caller may have built
        // the rows elsewhere.
        if let Some(row) = matrix.rows().iter().find(|r| r.len() != k) {
            return Err(PredictError::InvalidInputShape(format!(
                "row has {} entries, expected {}",
                row.len(),
                k
            )));
        }

        let mut means = vec![0.0f64; k];
        for row in matrix.rows() {
            for (mean, &p) in means.iter_mut().zip(row) {
                *mean += p;
            }
        }
        for mean in &mut means {
            *mean /= m as f64;
        }

        // Biased (population) variance per class.
        let mut variances = vec![0.0f64; k];
        for row in matrix.rows() {
            for ((var, &mean), &p) in variances.iter_mut().zip(&means).zip(row) {
                *var += (p - mean) * (p - mean);
            }
        }
        for var in &mut variances {
            *var = *var / m as f64 + self.variance_floor;
        }

        let s_mean = means
            .iter()
            .zip(&variances)
            .map(|(&mean, &var)| mean * (1.0 - mean) / var - 1.0)
            .sum::<f64>()
            / k as f64;

        let alpha0 = if s_mean.is_finite() {
            s_mean.max(self.concentration_floor)
        } else {
            self.concentration_floor
        };

        let alpha = means.iter().map(|&mean| mean * alpha0).collect();

        Ok(DirichletEstimate { alpha, alpha0 })
    }
}

impl Default for DirichletAggregator {
    fn default() -> Self {
        Self::new(&AggregationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: Vec<Vec<f64>>) -> ProbabilityMatrix {
        ProbabilityMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn test_alpha_is_positive_for_valid_input() {
        let aggregator = DirichletAggregator::default();
        let estimate = aggregator
            .fit(&matrix(vec![
                vec![0.7, 0.2, 0.1],
                vec![0.6, 0.3, 0.1],
                vec![0.8, 0.1, 0.1],
            ]))
            .unwrap();

        assert!(estimate.alpha0 > 0.0);
        assert!(estimate.alpha.iter().all(|&a| a >= 0.0));
    }

    #[test]
    fn test_expected_distribution_is_column_mean() {
        let aggregator = DirichletAggregator::default();
        let estimate = aggregator
            .fit(&matrix(vec![
                vec![0.7, 0.2, 0.1],
                vec![0.5, 0.3, 0.2],
                vec![0.6, 0.1, 0.3],
            ]))
            .unwrap();

        let expected = estimate.expected_probabilities();
        assert!((expected[0] - 0.6).abs() < 1e-9);
        assert!((expected[1] - 0.2).abs() < 1e-9);
        assert!((expected[2] - 0.2).abs() < 1e-9);
        assert!((expected.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unanimous_ensemble_has_very_high_confidence() {
        let aggregator = DirichletAggregator::default();
        let estimate = aggregator
            .fit(&matrix(vec![vec![0.9, 0.1]; 4]))
            .unwrap();

        // Variance collapses to the 1e-8 floor, so alpha0 is on the order of
        // m(1-m)/1e-8 = 9e6.
        assert!(estimate.alpha0 > 1e6);
        let expected = estimate.expected_probabilities();
        assert!((expected[0] - 0.9).abs() < 1e-9);
        assert!((expected[1] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_disagreeing_ensemble_has_low_confidence() {
        let aggregator = DirichletAggregator::default();
        let estimate = aggregator
            .fit(&matrix(vec![
                vec![0.9, 0.1],
                vec![0.1, 0.9],
                vec![0.9, 0.1],
                vec![0.1, 0.9],
            ]))
            .unwrap();

        // m = [0.5, 0.5], v = 0.16, S_k = 0.25/0.16 - 1 = 0.5625
        assert!((estimate.alpha0 - 0.5625).abs() < 1e-3);
        let expected = estimate.expected_probabilities();
        assert!((expected[0] - 0.5).abs() < 1e-9);
        assert!((expected[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_maximal_dispersion_floors_alpha0() {
        let aggregator = DirichletAggregator::default();
        let estimate = aggregator
            .fit(&matrix(vec![
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![0.0, 1.0],
            ]))
            .unwrap();

        // v = 0.25 and m(1-m) = 0.25, so every S_k is ~0 and alpha0 hits the
        // configured floor.
        assert!(estimate.alpha0 >= 1e-6);
        assert!(estimate.alpha0 < 1e-3);
    }

    #[test]
    fn test_fit_is_bit_identical() {
        let aggregator = DirichletAggregator::default();
        let input = matrix(vec![
            vec![0.4, 0.35, 0.25],
            vec![0.45, 0.3, 0.25],
            vec![0.38, 0.37, 0.25],
        ]);

        let first = aggregator.fit(&input).unwrap();
        let second = aggregator.fit(&input).unwrap();

        assert_eq!(first.alpha0.to_bits(), second.alpha0.to_bits());
        for (a, b) in first.alpha.iter().zip(&second.alpha) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_empty_matrix_is_rejected() {
        let aggregator = DirichletAggregator::default();
        let err = aggregator
            .fit(&ProbabilityMatrix::new(3))
            .unwrap_err();
        assert!(matches!(err, PredictError::InvalidInputShape(_)));
    }

    #[test]
    fn test_no_rows_at_all_is_rejected() {
        let err = ProbabilityMatrix::from_rows(vec![]).unwrap_err();
        assert!(matches!(err, PredictError::InvalidInputShape(_)));
    }

    #[test]
    fn test_custom_floors_are_respected() {
        let aggregator = DirichletAggregator::new(&AggregationConfig {
            variance_floor: 1e-4,
            concentration_floor: 0.5,
        });

        let unanimous = aggregator.fit(&matrix(vec![vec![0.9, 0.1]; 4])).unwrap();
        // 0.09 / 1e-4 - 1 = 899
        assert!((unanimous.alpha0 - 899.0).abs() < 1.0);

        let dispersed = aggregator
            .fit(&matrix(vec![vec![1.0, 0.0], vec![0.0, 1.0]]))
            .unwrap();
        assert_eq!(dispersed.alpha0, 0.5);
    }
}

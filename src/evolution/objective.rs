use crate::consts::QUADRATIC_FORM_TOLERANCE;
use crate::market::MarketInputs;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw objective values of one weight vector, in the natural (maximize return and
/// sentiment, minimize risk) sense.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub expected_return: f64,
    pub risk: f64,
    pub sentiment: f64,
    pub constraint_violation: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ObjectiveError {
    #[error("Weight vector has {found} components, expected {expected}.")]
    DimensionMismatch { expected: usize, found: usize },
    /// The covariance produced `w'Σw` well below zero. `clamped` holds the evaluation
    /// with the risk clamped to zero so a caller may continue.
    #[error("Quadratic form w'Σw is negative ({quadratic_form}); covariance input is malformed.")]
    NegativeQuadraticForm {
        quadratic_form: f64,
        clamped: Evaluation,
    },
    #[error("Evaluation produced a non-finite objective value.")]
    NonFinite,
}

/// Maps a weight vector to its objective values. Implementations must be pure so that
/// a population can be evaluated concurrently.
pub trait ObjectiveEvaluator: Send + Sync {
    fn asset_count(&self) -> usize;
    fn evaluate(&self, weights: &[f64]) -> Result<Evaluation, ObjectiveError>;
}

/// Expected return `w·r`, risk `sqrt(w'Σw)` and sentiment `w·s`.
#[derive(Debug, Clone, Copy)]
pub struct MeanRiskSentiment<'a> {
    inputs: &'a MarketInputs,
}

impl<'a> MeanRiskSentiment<'a> {
    pub fn new(inputs: &'a MarketInputs) -> Self {
        MeanRiskSentiment { inputs }
    }
}

impl ObjectiveEvaluator for MeanRiskSentiment<'_> {
    fn asset_count(&self) -> usize {
        self.inputs.asset_count()
    }

    fn evaluate(&self, weights: &[f64]) -> Result<Evaluation, ObjectiveError> {
        if weights.len() != self.asset_count() {
            return Err(ObjectiveError::DimensionMismatch {
                expected: self.asset_count(),
                found: weights.len(),
            });
        }

        let w = DVector::from_column_slice(weights);
        let expected_return = w.dot(self.inputs.expected_returns());
        let quadratic_form = w.dot(&(self.inputs.covariance() * &w));
        let sentiment = w.dot(self.inputs.sentiment());
        let constraint_violation = w.sum() - 1.;

        if !(expected_return.is_finite()
            && quadratic_form.is_finite()
            && sentiment.is_finite()
            && constraint_violation.is_finite())
        {
            return Err(ObjectiveError::NonFinite);
        }

        let evaluation = Evaluation {
            expected_return,
            // tiny negatives are rounding noise
            risk: quadratic_form.max(0.).sqrt(),
            sentiment,
            constraint_violation,
        };

        if quadratic_form < -QUADRATIC_FORM_TOLERANCE {
            return Err(ObjectiveError::NegativeQuadraticForm {
                quadratic_form,
                clamped: evaluation,
            });
        }
        Ok(evaluation)
    }
}

use crate::consts::FLOAT_COMPARISON_EPSILON;
use crate::evolution::objective::Evaluation;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A candidate allocation together with its evaluation and ranking metadata.
///
/// `objectives` uses the minimization convention: `[-expected_return, risk, -sentiment]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Portfolio {
    pub rank: Option<usize>,
    pub crowding_distance: Option<f64>,
    pub weights: Vec<f64>,
    pub objectives: [f64; 3],
    /// `sum(weights) - 1` of the weights that were evaluated.
    pub constraint_violation: f64,
    /// `sum(weights) - 1` of the raw vector before repair, kept for diagnostics.
    pub pre_repair_violation: f64,
}

impl Portfolio {
    pub fn new(weights: Vec<f64>, evaluation: Evaluation, pre_repair_violation: f64) -> Self {
        Portfolio {
            rank: None,
            crowding_distance: None,
            weights,
            objectives: [
                -evaluation.expected_return,
                evaluation.risk,
                -evaluation.sentiment,
            ],
            constraint_violation: evaluation.constraint_violation,
            pre_repair_violation,
        }
    }

    pub fn expected_return(&self) -> f64 {
        -self.objectives[0]
    }

    pub fn risk(&self) -> f64 {
        self.objectives[1]
    }

    pub fn sentiment(&self) -> f64 {
        -self.objectives[2]
    }

    /// Magnitude of the constraint violation, zero when within tolerance.
    pub fn penalty(&self) -> f64 {
        let violation = self.constraint_violation.abs();
        if violation <= FLOAT_COMPARISON_EPSILON {
            0.
        } else {
            violation
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.penalty() == 0.
    }

    /// Constrained domination: a smaller penalty always wins (so feasible beats
    /// infeasible), and equal penalties fall back to Pareto dominance on the objectives.
    pub fn dominates(&self, other: &Portfolio) -> bool {
        let (own_penalty, other_penalty) = (self.penalty(), other.penalty());
        if own_penalty != other_penalty {
            return own_penalty < other_penalty;
        }

        let at_least_as_good_in_all = self
            .objectives
            .iter()
            .zip(other.objectives.iter())
            .all(|(own, theirs)| own <= theirs);
        let strictly_better_in_one = self
            .objectives
            .iter()
            .zip(other.objectives.iter())
            .any(|(own, theirs)| own < theirs);

        at_least_as_good_in_all && strictly_better_in_one
    }

    pub fn is_dominated_by(&self, other: &Portfolio) -> bool {
        other.dominates(self)
    }

    /// Crowded comparison used by tournaments: lower rank first, then larger crowding distance.
    /// `Ordering::Less` means `self` is the better candidate.
    pub fn crowded_cmp(&self, other: &Portfolio) -> Ordering {
        let own_rank = self.rank.unwrap_or(usize::MAX);
        let other_rank = other.rank.unwrap_or(usize::MAX);
        own_rank.cmp(&other_rank).then_with(|| {
            let own_distance = self.crowding_distance.unwrap_or(f64::NEG_INFINITY);
            let other_distance = other.crowding_distance.unwrap_or(f64::NEG_INFINITY);
            other_distance.total_cmp(&own_distance)
        })
    }
}

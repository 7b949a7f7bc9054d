use crate::consts::FLOAT_COMPARISON_EPSILON;
use crate::portfolio::Portfolio;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid risk appetite `{0}`.")]
pub struct InvalidProfileError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskAppetite {
    Aggressive,
    Conservative,
    Moderate,
    RiskAverse,
    RiskSeeking,
    Uncertain,
}

/// How much each normalized objective counts in the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAppetiteProfile {
    pub returns_weight: f64,
    pub risk_weight: f64,
    pub sentiment_weight: f64,
}

impl RiskAppetite {
    pub const ALL: [RiskAppetite; 6] = [
        RiskAppetite::Aggressive,
        RiskAppetite::Conservative,
        RiskAppetite::Moderate,
        RiskAppetite::RiskAverse,
        RiskAppetite::RiskSeeking,
        RiskAppetite::Uncertain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskAppetite::Aggressive => "aggressive",
            RiskAppetite::Conservative => "conservative",
            RiskAppetite::Moderate => "moderate",
            RiskAppetite::RiskAverse => "risk-averse",
            RiskAppetite::RiskSeeking => "risk-seeking",
            RiskAppetite::Uncertain => "uncertain",
        }
    }

    // Risk-averse/conservative, risk-seeking/aggressive and uncertain/moderate
    // intentionally share weights.
    pub fn profile(&self) -> RiskAppetiteProfile {
        let (returns_weight, risk_weight, sentiment_weight) = match self {
            RiskAppetite::Aggressive => (0.5, 0.2, 0.3),
            RiskAppetite::Conservative => (0.2, 0.5, 0.3),
            RiskAppetite::Moderate => (0.3, 0.4, 0.3),
            RiskAppetite::RiskAverse => (0.2, 0.5, 0.3),
            RiskAppetite::RiskSeeking => (0.5, 0.2, 0.3),
            RiskAppetite::Uncertain => (0.3, 0.4, 0.3),
        };
        RiskAppetiteProfile {
            returns_weight,
            risk_weight,
            sentiment_weight,
        }
    }
}

impl FromStr for RiskAppetite {
    type Err = InvalidProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskAppetite::ALL
            .into_iter()
            .find(|appetite| appetite.as_str() == s)
            .ok_or_else(|| InvalidProfileError(s.to_string()))
    }
}

impl fmt::Display for RiskAppetite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Min-max normalization to `[0, 1]`. A constant series normalizes to all zeros, where
/// constant means the range is within rounding noise relative to the values' magnitude.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    let magnitude = max.abs().max(min.abs());
    if range.is_nan() || range <= FLOAT_COMPARISON_EPSILON * magnitude {
        return vec![0.; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

pub fn compute_composite_scores(
    returns: &[f64],
    risk: &[f64],
    sentiment: &[f64],
    profile: &RiskAppetiteProfile,
) -> Vec<f64> {
    let normalized_returns = normalize(returns);
    let normalized_risk = normalize(risk);
    let normalized_sentiment = normalize(sentiment);

    itertools::izip!(normalized_returns, normalized_risk, normalized_sentiment)
        .map(|(ret, risk, sentiment)| {
            profile.returns_weight * ret - profile.risk_weight * risk
                + profile.sentiment_weight * sentiment
        })
        .collect()
}

/// Picks the front member with the highest composite score, alongside that score.
/// Ties go to the earliest member, so the choice is deterministic.
pub fn select_optimal_portfolio<'a>(
    pareto_front: &'a [Portfolio],
    profile: &RiskAppetiteProfile,
) -> Option<(&'a Portfolio, f64)> {
    let returns = pareto_front
        .iter()
        .map(Portfolio::expected_return)
        .collect::<Vec<f64>>();
    let risk = pareto_front.iter().map(Portfolio::risk).collect::<Vec<f64>>();
    let sentiment = pareto_front
        .iter()
        .map(Portfolio::sentiment)
        .collect::<Vec<f64>>();

    let scores = compute_composite_scores(&returns, &risk, &sentiment, profile);

    let mut best: Option<(usize, f64)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, score)| (&pareto_front[idx], score))
}

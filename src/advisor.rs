//! Wiring between the optimizer and the collaborators that supply its inputs.
//!
//! Collaborators are handed to [`Advisor::new`] explicitly, so concurrent
//! recommendations never share mutable state.

use std::collections::HashMap;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::evolution::objective::MeanRiskSentiment;
use crate::evolution::portfolio_evolution::{
    optimize_portfolio, EvolutionConfig, OptimizationError,
};
use crate::evolution::selection::{InvalidProfileError, RiskAppetite};
use crate::market::{ConfigurationError, MarketInputs, MarketMetrics};

/// Supplies expected returns and covariance for a set of tickers.
pub trait MarketDataSource: Send + Sync {
    fn market_metrics(&self, tickers: &[String]) -> anyhow::Result<MarketMetrics>;
}

/// Supplies one sentiment score per ticker.
pub trait SentimentSource: Send + Sync {
    fn sentiment_score(&self, ticker: &str) -> anyhow::Result<f64>;
}

/// Close-price series already in memory, one per ticker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoricalPrices {
    prices: HashMap<String, Vec<f64>>,
}

impl HistoricalPrices {
    pub fn new(prices: HashMap<String, Vec<f64>>) -> Self {
        HistoricalPrices { prices }
    }
}

impl MarketDataSource for HistoricalPrices {
    fn market_metrics(&self, tickers: &[String]) -> anyhow::Result<MarketMetrics> {
        let series = tickers
            .iter()
            .map(|ticker| {
                self.prices
                    .get(ticker)
                    .cloned()
                    .ok_or_else(|| anyhow!("no price history for `{ticker}`"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        MarketMetrics::from_price_history(tickers, &series)
            .context("failed to derive market metrics from price history")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticSentiment {
    scores: HashMap<String, f64>,
}

impl StaticSentiment {
    pub fn new(scores: HashMap<String, f64>) -> Self {
        StaticSentiment { scores }
    }
}

impl SentimentSource for StaticSentiment {
    fn sentiment_score(&self, ticker: &str) -> anyhow::Result<f64> {
        self.scores
            .get(ticker)
            .copied()
            .ok_or_else(|| anyhow!("no sentiment score for `{ticker}`"))
    }
}

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error(transparent)]
    InvalidProfile(#[from] InvalidProfileError),
    #[error("Market data unavailable: {0:#}")]
    MarketData(#[source] anyhow::Error),
    #[error("Sentiment unavailable for `{ticker}`: {source:#}")]
    Sentiment {
        ticker: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Optimization(#[from] OptimizationError),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Allocation {
    pub ticker: String,
    pub weight: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Recommendation {
    pub risk_appetite: RiskAppetite,
    pub allocations: Vec<Allocation>,
    pub expected_return: f64,
    pub risk: f64,
    pub sentiment: f64,
    pub composite_score: f64,
    pub pareto_front_size: usize,
    pub generations_run: usize,
}

impl Recommendation {
    pub fn weights(&self) -> Vec<f64> {
        self.allocations.iter().map(|a| a.weight).collect()
    }
}

pub struct Advisor<M, S> {
    market_data: M,
    sentiment: S,
    config: EvolutionConfig,
}

impl<M: MarketDataSource, S: SentimentSource> Advisor<M, S> {
    pub fn new(market_data: M, sentiment: S, config: EvolutionConfig) -> Self {
        Advisor {
            market_data,
            sentiment,
            config,
        }
    }

    /// Validates the profile, gathers inputs, then runs the optimizer.
    pub fn recommend(
        &self,
        tickers: &[String],
        risk_appetite: &str,
    ) -> Result<Recommendation, AdvisorError> {
        let risk_appetite: RiskAppetite = risk_appetite.parse()?;

        let metrics = self
            .market_data
            .market_metrics(tickers)
            .map_err(AdvisorError::MarketData)?;
        let sentiment = tickers
            .iter()
            .map(|ticker| {
                self.sentiment
                    .sentiment_score(ticker)
                    .map_err(|source| AdvisorError::Sentiment {
                        ticker: ticker.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let inputs = MarketInputs::from_metrics(tickers.to_vec(), metrics, sentiment)?;
        let evaluator = MeanRiskSentiment::new(&inputs);
        let selected = optimize_portfolio(&evaluator, &self.config, risk_appetite.as_str())?;

        info!(
            %risk_appetite,
            assets = tickers.len(),
            expected_return = selected.expected_return,
            risk = selected.risk,
            sentiment = selected.sentiment,
            "Recommendation ready."
        );

        Ok(Recommendation {
            risk_appetite,
            allocations: tickers
                .iter()
                .zip(selected.weights.iter())
                .map(|(ticker, &weight)| Allocation {
                    ticker: ticker.clone(),
                    weight,
                })
                .collect(),
            expected_return: selected.expected_return,
            risk: selected.risk,
            sentiment: selected.sentiment,
            composite_score: selected.composite_score,
            pareto_front_size: selected.evolution.pareto_front.len(),
            generations_run: selected.evolution.generations_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingMarket {
        inner: HistoricalPrices,
        calls: AtomicUsize,
    }

    impl MarketDataSource for CountingMarket {
        fn market_metrics(&self, tickers: &[String]) -> anyhow::Result<MarketMetrics> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.market_metrics(tickers)
        }
    }

    fn tickers() -> Vec<String> {
        vec!["STEADY".into(), "SWING".into()]
    }

    fn prices() -> HistoricalPrices {
        HistoricalPrices::new(HashMap::from([
            ("STEADY".to_string(), vec![100., 101., 102.5, 103., 104.2, 105.]),
            ("SWING".to_string(), vec![50., 55., 48., 58., 52., 60.]),
        ]))
    }

    fn sentiment() -> StaticSentiment {
        StaticSentiment::new(HashMap::from([
            ("STEADY".to_string(), 0.2),
            ("SWING".to_string(), -0.1),
        ]))
    }

    fn small_config() -> EvolutionConfig {
        EvolutionConfig {
            population_size: 20,
            generations: 10,
            global_seed: Some(17),
            max_concurrency: 2,
            ..EvolutionConfig::default()
        }
    }

    #[test]
    fn test_recommend_returns_an_allocation_per_ticker() {
        let advisor = Advisor::new(prices(), sentiment(), small_config());
        let recommendation = advisor.recommend(&tickers(), "moderate").unwrap();

        assert_eq!(recommendation.risk_appetite, RiskAppetite::Moderate);
        assert_eq!(recommendation.allocations.len(), 2);
        assert_eq!(recommendation.allocations[0].ticker, "STEADY");
        let total: f64 = recommendation.weights().iter().sum();
        assert!((total - 1.0).abs() < 1e-6, "Weights should sum to 1. Got {total}");
        assert!(recommendation.pareto_front_size >= 1);
        assert_eq!(recommendation.generations_run, 10);
    }

    #[test]
    fn test_invalid_profile_is_rejected_before_fetching() {
        let market = CountingMarket {
            inner: prices(),
            calls: AtomicUsize::new(0),
        };
        let advisor = Advisor::new(market, sentiment(), small_config());

        let err = advisor.recommend(&tickers(), "yolo").unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidProfile(_)));
        assert_eq!(advisor.market_data.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_collaborator_data_is_reported() {
        let advisor = Advisor::new(prices(), StaticSentiment::default(), small_config());
        let err = advisor.recommend(&tickers(), "aggressive").unwrap_err();
        assert!(
            matches!(err, AdvisorError::Sentiment { ref ticker, .. } if ticker == "STEADY"),
            "Unexpected error {err}"
        );

        let advisor = Advisor::new(HistoricalPrices::default(), sentiment(), small_config());
        let err = advisor.recommend(&tickers(), "aggressive").unwrap_err();
        assert!(matches!(err, AdvisorError::MarketData(_)));
    }
}

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use thiserror::Error;
use tracing::warn;

use crate::consts::{FLOAT_COMPARISON_EPSILON, MIN_PRICE_HISTORY};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("The asset list is empty.")]
    EmptyAssetList,
    #[error("Dimension mismatch for {what}: expected {expected}, found {found}.")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Non-finite value in {what} at flat index {index}.")]
    NonFiniteEntry { what: &'static str, index: usize },
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Not enough price history for `{ticker}`: need {needed} prices, found {found}.")]
    InsufficientHistory {
        ticker: String,
        needed: usize,
        found: usize,
    },
}

/// Per-asset expected returns and their covariance, as supplied by a market data collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketMetrics {
    pub expected_returns: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
}

impl MarketMetrics {
    /// Builds metrics out of aligned close-price series (one series per ticker).
    ///
    /// Returns are simple period returns `p_t / p_{t-1} - 1`, the expected return is
    /// their arithmetic mean and the covariance uses the sample (n - 1) estimator.
    pub fn from_price_history(
        tickers: &[String],
        prices: &[Vec<f64>],
    ) -> Result<Self, ConfigurationError> {
        if tickers.is_empty() {
            return Err(ConfigurationError::EmptyAssetList);
        }
        if prices.len() != tickers.len() {
            return Err(ConfigurationError::DimensionMismatch {
                what: "price history",
                expected: tickers.len(),
                found: prices.len(),
            });
        }

        let periods = prices[0].len();
        for (ticker, series) in tickers.iter().zip(prices) {
            if series.len() < MIN_PRICE_HISTORY {
                return Err(ConfigurationError::InsufficientHistory {
                    ticker: ticker.clone(),
                    needed: MIN_PRICE_HISTORY,
                    found: series.len(),
                });
            }
            if series.len() != periods {
                return Err(ConfigurationError::DimensionMismatch {
                    what: "price history length",
                    expected: periods,
                    found: series.len(),
                });
            }
        }

        let returns = prices
            .iter()
            .map(|series| {
                series
                    .windows(2)
                    .map(|pair| pair[1] / pair[0] - 1.)
                    .collect::<Vec<f64>>()
            })
            .collect::<Vec<_>>();

        let returns_per_asset = periods - 1;
        for (asset_idx, series) in returns.iter().enumerate() {
            if let Some(period) = series.iter().position(|r| !r.is_finite()) {
                return Err(ConfigurationError::NonFiniteEntry {
                    what: "period returns",
                    index: asset_idx * returns_per_asset + period,
                });
            }
        }

        let expected_returns = returns.iter().map(|series| series.iter().mean()).collect();
        let covariance = returns
            .iter()
            .map(|row_series| {
                returns
                    .iter()
                    .map(|col_series| row_series.iter().covariance(col_series.iter()))
                    .collect()
            })
            .collect();

        Ok(MarketMetrics {
            expected_returns,
            covariance,
        })
    }
}

/// Read-only inputs shared by every evaluation of one optimization run.
#[derive(Debug, Clone)]
pub struct MarketInputs {
    assets: Vec<String>,
    expected_returns: DVector<f64>,
    covariance: DMatrix<f64>,
    sentiment: DVector<f64>,
}

impl MarketInputs {
    pub fn new(
        assets: Vec<String>,
        expected_returns: Vec<f64>,
        covariance: Vec<Vec<f64>>,
        sentiment: Vec<f64>,
    ) -> Result<Self, ConfigurationError> {
        let n = assets.len();
        if n == 0 {
            return Err(ConfigurationError::EmptyAssetList);
        }
        check_len("expected returns", n, expected_returns.len())?;
        check_len("sentiment", n, sentiment.len())?;
        check_len("covariance rows", n, covariance.len())?;
        for row in covariance.iter() {
            check_len("covariance columns", n, row.len())?;
        }

        check_finite("expected returns", expected_returns.iter())?;
        check_finite("sentiment", sentiment.iter())?;
        check_finite("covariance", covariance.iter().flatten())?;

        let flat = covariance.into_iter().flatten().collect::<Vec<f64>>();
        let covariance = DMatrix::from_row_slice(n, n, &flat);

        let asymmetry = (&covariance - covariance.transpose()).amax();
        if asymmetry > FLOAT_COMPARISON_EPSILON {
            warn!(asymmetry, "Covariance matrix is not symmetric.");
        }

        Ok(MarketInputs {
            assets,
            expected_returns: DVector::from_vec(expected_returns),
            covariance,
            sentiment: DVector::from_vec(sentiment),
        })
    }

    pub fn from_metrics(
        assets: Vec<String>,
        metrics: MarketMetrics,
        sentiment: Vec<f64>,
    ) -> Result<Self, ConfigurationError> {
        Self::new(
            assets,
            metrics.expected_returns,
            metrics.covariance,
            sentiment,
        )
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn expected_returns(&self) -> &DVector<f64> {
        &self.expected_returns
    }

    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    pub fn sentiment(&self) -> &DVector<f64> {
        &self.sentiment
    }
}

fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), ConfigurationError> {
    if expected != found {
        return Err(ConfigurationError::DimensionMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

fn check_finite<'a>(
    what: &'static str,
    mut values: impl Iterator<Item = &'a f64>,
) -> Result<(), ConfigurationError> {
    match values.position(|v| !v.is_finite()) {
        Some(index) => Err(ConfigurationError::NonFiniteEntry { what, index }),
        None => Ok(()),
    }
}

// Modules
pub mod advisor;
pub mod consts;
pub mod evolution;
pub mod market;
pub mod portfolio;

pub use advisor::{Advisor, AdvisorError, Recommendation};
pub use evolution::objective::{MeanRiskSentiment, ObjectiveEvaluator};
pub use evolution::portfolio_evolution::{
    optimize_portfolio, EvolutionConfig, EvolutionResult, OptimizationError, SelectedPortfolio,
};
pub use evolution::selection::{RiskAppetite, RiskAppetiteProfile};
pub use market::{ConfigurationError, MarketInputs, MarketMetrics};

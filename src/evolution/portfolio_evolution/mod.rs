use crate::consts::{
    DEFAULT_GENERATIONS, DEFAULT_POPULATION_SIZE, MAX_REPAIR_ATTEMPTS, PERTURBATION, REPAIR_FLOOR,
};
use crate::evolution::objective::{Evaluation, ObjectiveError, ObjectiveEvaluator};
use crate::evolution::repair::{repair_or_resample, sample_raw_weights};
use crate::evolution::selection::{select_optimal_portfolio, InvalidProfileError, RiskAppetite};
use crate::market::ConfigurationError;
use crate::portfolio::Portfolio;
use rand::prelude::*;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;
use tracing::debug;

pub mod pareto_evolution;

pub use pareto_evolution::standard_pareto::StandardParetoEvolution;

// Strategy Definition
pub trait EvolutionStrategy {
    fn evolve<E: ObjectiveEvaluator>(
        &self,
        evaluator: &E,
        config: &EvolutionConfig,
    ) -> Result<EvolutionResult, OptimizationError>;
}

#[derive(Error, Debug)]
pub enum OptimizationError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    InvalidProfile(#[from] InvalidProfileError),
    #[error("Portfolio evaluation failed: {0}")]
    Evaluation(#[from] ObjectiveError),
    #[error("Could not build the evaluation thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("The final population has no Pareto front.")]
    EmptyParetoFront,
}

fn default_max_concurrency() -> usize {
    num_cpus::get()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub generations: usize,
    /// Per-component mutation probability, `1 / assets` when unset.
    pub mutation_rate: Option<f64>,
    /// Half-width of the uniform mutation perturbation.
    pub mutation_perturbation: f64,
    pub repair_floor: f64,
    pub max_repair_attempts: usize,
    pub global_seed: Option<u64>,
    pub max_concurrency: usize,
    /// Checked between generations only.
    pub time_limit_ms: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        EvolutionConfig {
            population_size: DEFAULT_POPULATION_SIZE,
            generations: DEFAULT_GENERATIONS,
            mutation_rate: None,
            mutation_perturbation: PERTURBATION,
            repair_floor: REPAIR_FLOOR,
            max_repair_attempts: MAX_REPAIR_ATTEMPTS,
            global_seed: None,
            max_concurrency: default_max_concurrency(),
            time_limit_ms: None,
        }
    }
}

impl EvolutionConfig {
    pub fn validate(&self, assets: usize) -> Result<(), ConfigurationError> {
        if assets == 0 {
            return Err(ConfigurationError::EmptyAssetList);
        }
        if self.population_size == 0 {
            return Err(ConfigurationError::InvalidParameter(
                "Population size cannot be zero".into(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigurationError::InvalidParameter(
                "Max concurrency cannot be zero".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.repair_floor) {
            return Err(ConfigurationError::InvalidParameter(format!(
                "Repair floor must lie in [0, 1), got {}",
                self.repair_floor
            )));
        }
        if let Some(rate) = self.mutation_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigurationError::InvalidParameter(format!(
                    "Mutation rate must lie in [0, 1], got {rate}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.mutation_perturbation) {
            return Err(ConfigurationError::InvalidParameter(format!(
                "Mutation perturbation must lie in [0, 1], got {}",
                self.mutation_perturbation
            )));
        }
        Ok(())
    }

    pub fn effective_mutation_rate(&self, assets: usize) -> f64 {
        self.mutation_rate
            .unwrap_or_else(|| 1. / assets.max(1) as f64)
    }
}

/// Best and average objective values over one population.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PopulationSummary {
    /// Best (highest) expected return in the population.
    pub best_return: f64,
    pub population_average_return: f64,
    /// Best (lowest) risk in the population.
    pub best_risk: f64,
    pub population_average_risk: f64,
    /// Best (highest) sentiment in the population.
    pub best_sentiment: f64,
    pub population_average_sentiment: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EvolutionResult {
    /// Rank-0 members of the final population.
    pub pareto_front: Vec<Portfolio>,
    pub generation_summaries: Vec<PopulationSummary>,
    pub final_summary: PopulationSummary,
    /// Can be lower than the configured budget when a time limit is hit.
    pub generations_run: usize,
    /// Candidates that had to be redrawn because repair left nothing to hold.
    pub resampled_candidates: usize,
    /// Evaluations whose risk was clamped to zero from a negative quadratic form.
    #[serde(default)]
    pub clamped_risk_evaluations: usize,
}

/// A repaired weight vector awaiting evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Offspring {
    pub weights: Vec<f64>,
    pub pre_repair_violation: f64,
    pub resampled: bool,
}

fn repair_offspring<R: Rng + ?Sized>(
    raw: Vec<f64>,
    config: &EvolutionConfig,
    rng: &mut R,
) -> Offspring {
    let pre_repair_violation = raw.iter().sum::<f64>() - 1.;
    let outcome = repair_or_resample(&raw, config.repair_floor, config.max_repair_attempts, rng);
    Offspring {
        weights: outcome.weights,
        pre_repair_violation,
        resampled: outcome.resampled,
    }
}

/// Generation zero: uniform draws repaired into the feasible region.
pub fn initialize_population<R: Rng + ?Sized>(
    config: &EvolutionConfig,
    assets_under_management: usize,
    rng: &mut R,
) -> Result<Vec<Offspring>, ConfigurationError> {
    if config.population_size == 0 && assets_under_management == 0 {
        return Err(ConfigurationError::InvalidParameter(
            "Both population size and assets under management are zero, but none are supposed to be.".into(),
        ));
    } else if config.population_size == 0 {
        return Err(ConfigurationError::InvalidParameter(
            "Population size cannot be zero".into(),
        ));
    } else if assets_under_management == 0 {
        return Err(ConfigurationError::EmptyAssetList);
    }

    Ok((0..config.population_size)
        .map(|_| {
            let raw = sample_raw_weights(assets_under_management, rng);
            repair_offspring(raw, config, rng)
        })
        .collect())
}

/// Binary tournament on (rank, crowding distance); a full tie keeps the first pick.
pub fn tournament_selection<'a, R: Rng + ?Sized>(
    population: &'a [Portfolio],
    rng: &mut R,
) -> &'a Portfolio {
    let contestant_1 = &population[rng.gen_range(0..population.len())];
    let contestant_2 = &population[rng.gen_range(0..population.len())];

    match contestant_1.crowded_cmp(contestant_2) {
        Ordering::Greater => contestant_2,
        _ => contestant_1,
    }
}

/// Blends two parents with one mixing coefficient, giving the two mirrored children.
pub fn crossover<R: Rng + ?Sized>(
    parent_1: &[f64],
    parent_2: &[f64],
    rng: &mut R,
) -> (Vec<f64>, Vec<f64>) {
    let alpha: f64 = rng.gen_range(0.0..=1.0);
    parent_1
        .iter()
        .zip(parent_2.iter())
        .map(|(&weight_1, &weight_2)| {
            (
                alpha * weight_1 + (1.0 - alpha) * weight_2,
                (1.0 - alpha) * weight_1 + alpha * weight_2,
            )
        })
        .unzip()
}

/// Perturbs each component with probability `mutation_rate`. Leaves repair to the caller.
pub fn mutate<R: Rng + ?Sized>(
    weights: &mut [f64],
    mutation_rate: f64,
    perturbation: f64,
    rng: &mut R,
) {
    if perturbation <= 0. {
        return;
    }
    for weight in weights.iter_mut() {
        if rng.gen_bool(mutation_rate) {
            *weight += rng.gen_range(-perturbation..perturbation);
        }
    }
}

/// Tournament, crossover, mutation and repair until `offspring_count` children exist.
pub fn generate_offsprings<R: Rng + ?Sized>(
    population: &[Portfolio],
    offspring_count: usize,
    config: &EvolutionConfig,
    mutation_rate: f64,
    rng: &mut R,
) -> Vec<Offspring> {
    let mut offsprings = Vec::with_capacity(offspring_count + 1);

    while offsprings.len() < offspring_count {
        let parent_1 = tournament_selection(population, rng);
        let parent_2 = tournament_selection(population, rng);

        let (mut child_1, mut child_2) = crossover(&parent_1.weights, &parent_2.weights, rng);
        for child in [&mut child_1, &mut child_2] {
            mutate(child, mutation_rate, config.mutation_perturbation, rng);
        }

        offsprings.push(repair_offspring(child_1, config, rng));
        offsprings.push(repair_offspring(child_2, config, rng));
    }
    offsprings.truncate(offspring_count);
    offsprings
}

/// A batch of evaluated offspring.
#[derive(Debug, Clone)]
pub struct EvaluatedBatch {
    pub portfolios: Vec<Portfolio>,
    /// How many of them had a negative quadratic form clamped to zero risk.
    pub clamped_risk: usize,
}

fn evaluate_offspring<E: ObjectiveEvaluator>(
    evaluator: &E,
    offspring: Offspring,
) -> Result<(Portfolio, bool), ObjectiveError> {
    let (evaluation, clamped): (Evaluation, bool) = match evaluator.evaluate(&offspring.weights) {
        Ok(evaluation) => (evaluation, false),
        Err(ObjectiveError::NegativeQuadraticForm { clamped, .. }) => (clamped, true),
        Err(err) => return Err(err),
    };
    let portfolio = Portfolio::new(
        offspring.weights,
        evaluation,
        offspring.pre_repair_violation,
    );
    Ok((portfolio, clamped))
}

/// Evaluates every offspring on `pool`; output order matches input order.
/// The first unexpected evaluation error fails the whole batch.
pub fn evaluate_offsprings<E: ObjectiveEvaluator>(
    evaluator: &E,
    offsprings: Vec<Offspring>,
    pool: &ThreadPool,
) -> Result<EvaluatedBatch, ObjectiveError> {
    let evaluated: Vec<(Portfolio, bool)> = pool.install(|| {
        offsprings
            .into_par_iter()
            .map(|offspring| evaluate_offspring(evaluator, offspring))
            .collect::<Result<_, _>>()
    })?;

    let clamped_risk = evaluated.iter().filter(|(_, clamped)| *clamped).count();
    if clamped_risk > 0 {
        debug!(clamped_risk, "Negative quadratic forms in batch, risk clamped to zero.");
    }
    Ok(EvaluatedBatch {
        portfolios: evaluated.into_iter().map(|(portfolio, _)| portfolio).collect(),
        clamped_risk,
    })
}

pub fn summarize_population(population: &[Portfolio]) -> PopulationSummary {
    let population_size = population.len().max(1) as f64;

    let best_return = population
        .par_iter()
        .map(Portfolio::expected_return)
        .reduce(|| f64::NEG_INFINITY, f64::max);
    let best_risk = population
        .par_iter()
        .map(Portfolio::risk)
        .reduce(|| f64::INFINITY, f64::min);
    let best_sentiment = population
        .par_iter()
        .map(Portfolio::sentiment)
        .reduce(|| f64::NEG_INFINITY, f64::max);

    PopulationSummary {
        best_return,
        population_average_return: population
            .par_iter()
            .map(Portfolio::expected_return)
            .sum::<f64>()
            / population_size,
        best_risk,
        population_average_risk: population.par_iter().map(Portfolio::risk).sum::<f64>()
            / population_size,
        best_sentiment,
        population_average_sentiment: population
            .par_iter()
            .map(Portfolio::sentiment)
            .sum::<f64>()
            / population_size,
    }
}

/// The chosen allocation and what it scored.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SelectedPortfolio {
    pub risk_appetite: RiskAppetite,
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub risk: f64,
    pub sentiment: f64,
    pub composite_score: f64,
    pub evolution: EvolutionResult,
}

/// Runs the evolution and collapses its Pareto front to one allocation.
///
/// The risk appetite is parsed before anything else so an unknown profile costs no
/// evaluations.
pub fn optimize_portfolio<E: ObjectiveEvaluator>(
    evaluator: &E,
    config: &EvolutionConfig,
    risk_appetite: &str,
) -> Result<SelectedPortfolio, OptimizationError> {
    let risk_appetite: RiskAppetite = risk_appetite.parse()?;
    let evolution = StandardParetoEvolution.evolve(evaluator, config)?;

    let (chosen, composite_score) =
        select_optimal_portfolio(&evolution.pareto_front, &risk_appetite.profile())
            .ok_or(OptimizationError::EmptyParetoFront)?;

    Ok(SelectedPortfolio {
        risk_appetite,
        weights: chosen.weights.clone(),
        expected_return: chosen.expected_return(),
        risk: chosen.risk(),
        sentiment: chosen.sentiment(),
        composite_score,
        evolution,
    })
}

// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::objective::MeanRiskSentiment;
    use crate::market::MarketInputs;
    use crate::portfolio::tests::create_portfolio;
    use rand::rngs::StdRng;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    struct CountingEvaluator {
        calls: AtomicUsize,
    }

    impl ObjectiveEvaluator for CountingEvaluator {
        fn asset_count(&self) -> usize {
            2
        }
        fn evaluate(&self, weights: &[f64]) -> Result<Evaluation, ObjectiveError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(Evaluation {
                expected_return: weights[0],
                risk: weights[1],
                sentiment: 0.,
                constraint_violation: weights.iter().sum::<f64>() - 1.,
            })
        }
    }

    /// Answers like `CountingEvaluator` until `fail_after` calls, then reports a non-finite value.
    struct FailingEvaluator {
        calls: AtomicUsize,
        fail_after: usize,
    }

    impl ObjectiveEvaluator for FailingEvaluator {
        fn asset_count(&self) -> usize {
            2
        }
        fn evaluate(&self, weights: &[f64]) -> Result<Evaluation, ObjectiveError> {
            if self.calls.fetch_add(1, AtomicOrdering::SeqCst) >= self.fail_after {
                return Err(ObjectiveError::NonFinite);
            }
            Ok(Evaluation {
                expected_return: weights[0],
                risk: weights[1],
                sentiment: 0.,
                constraint_violation: weights.iter().sum::<f64>() - 1.,
            })
        }
    }

    fn seeded_config(population_size: usize, generations: usize, seed: u64) -> EvolutionConfig {
        EvolutionConfig {
            population_size,
            generations,
            global_seed: Some(seed),
            max_concurrency: 2,
            ..EvolutionConfig::default()
        }
    }

    fn assert_feasible(weights: &[f64]) {
        let sum: f64 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6, "Weights should sum to 1. Got {sum}");
        for &w in weights.iter() {
            assert!(w == 0. || w >= REPAIR_FLOOR, "Weight {w} is under the floor");
        }
    }

    #[test]
    fn test_initialize_population_errors_and_normalization() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut config = seeded_config(0, 1, 1);
        assert!(initialize_population(&config, 4, &mut rng).is_err());
        config.population_size = 10;
        assert!(initialize_population(&config, 0, &mut rng).is_err());

        let population = initialize_population(&config, 4, &mut rng).unwrap();
        assert_eq!(population.len(), 10);
        for offspring in population.iter() {
            assert_feasible(&offspring.weights);
        }
    }

    #[test]
    fn test_config_validation() {
        let config = EvolutionConfig::default();
        assert!(config.validate(3).is_ok());
        assert!(config.validate(0).is_err());
        assert!(EvolutionConfig {
            repair_floor: 1.0,
            ..config.clone()
        }
        .validate(3)
        .is_err());
        assert!(EvolutionConfig {
            mutation_rate: Some(1.5),
            ..config.clone()
        }
        .validate(3)
        .is_err());
        assert!(EvolutionConfig {
            max_concurrency: 0,
            ..config.clone()
        }
        .validate(3)
        .is_err());
        assert_eq!(config.effective_mutation_rate(4), 0.25);
    }

    #[test]
    fn test_config_rejects_out_of_range_perturbation() {
        let config = EvolutionConfig::default();
        for perturbation in [1e308, 1.5, -0.1, f64::NAN, f64::INFINITY] {
            assert!(
                EvolutionConfig {
                    mutation_perturbation: perturbation,
                    ..config.clone()
                }
                .validate(3)
                .is_err(),
                "Perturbation {perturbation} should be rejected"
            );
        }
        assert!(EvolutionConfig {
            mutation_perturbation: 1.0,
            ..config
        }
        .validate(3)
        .is_ok());
    }

    #[test]
    fn test_evaluation_error_is_fatal() {
        // 10 initial evaluations, then it fails inside the second generation.
        let evaluator = FailingEvaluator {
            calls: AtomicUsize::new(0),
            fail_after: 25,
        };
        let result = optimize_portfolio(&evaluator, &seeded_config(10, 5, 21), "moderate");

        assert!(
            matches!(
                result,
                Err(OptimizationError::Evaluation(ObjectiveError::NonFinite))
            ),
            "Expected a fatal evaluation error, got {result:?}"
        );
        assert!(evaluator.calls.load(AtomicOrdering::SeqCst) > 25);

        let evaluator = FailingEvaluator {
            calls: AtomicUsize::new(0),
            fail_after: 25,
        };
        let result = StandardParetoEvolution.evolve(&evaluator, &seeded_config(10, 5, 21));
        assert!(matches!(result, Err(OptimizationError::Evaluation(_))));
    }

    #[test]
    fn test_high_floor_resamples_and_stays_feasible() {
        let evaluator = CountingEvaluator {
            calls: AtomicUsize::new(0),
        };
        // Two U(0, 1) draws rarely leave exactly one component above 0.9.
        let config = EvolutionConfig {
            repair_floor: 0.9,
            ..seeded_config(20, 5, 31)
        };
        let result = StandardParetoEvolution.evolve(&evaluator, &config).unwrap();

        assert!(result.resampled_candidates > 0);
        for portfolio in result.pareto_front.iter() {
            let mut weights = portfolio.weights.clone();
            weights.sort_by(f64::total_cmp);
            assert_eq!(weights, vec![0., 1.]);
        }
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: EvolutionConfig =
            serde_json::from_str(r#"{ "generations": 5, "global_seed": 9 }"#).unwrap();
        assert_eq!(config.generations, 5);
        assert_eq!(config.population_size, DEFAULT_POPULATION_SIZE);
        assert_eq!(config.repair_floor, REPAIR_FLOOR);
        assert_eq!(config.global_seed, Some(9));
        assert!(config.max_concurrency >= 1);
    }

    #[test]
    fn test_tournament_prefers_rank_then_crowding() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut good = create_portfolio(0.1, 0.1, 0.1);
        good.rank = Some(0);
        good.crowding_distance = Some(1.0);
        let mut bad = create_portfolio(0.1, 0.1, 0.1);
        bad.rank = Some(3);
        bad.crowding_distance = Some(f64::INFINITY);
        let population = vec![good.clone(), bad];

        // The worse candidate only wins when it is drawn twice.
        let wins = (0..400)
            .filter(|_| tournament_selection(&population, &mut rng) == &good)
            .count();
        assert!(wins > 250, "Rank 0 should win most tournaments, won {wins}");
    }

    #[test]
    fn test_crossover_is_convex() {
        let mut rng = StdRng::seed_from_u64(3);
        let parent_1 = vec![1.0, 0.0, 0.0];
        let parent_2 = vec![0.0, 0.5, 0.5];
        for _ in 0..20 {
            let (child_1, child_2) = crossover(&parent_1, &parent_2, &mut rng);
            for child in [child_1, child_2] {
                assert!((child.iter().sum::<f64>() - 1.0).abs() < 1e-12);
                assert!(child.iter().all(|&w| (0.0..=1.0).contains(&w)));
                assert!((child[1] - child[2]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_mutate_respects_rate() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut weights = vec![0.25; 4];
        mutate(&mut weights, 0.0, 0.1, &mut rng);
        assert_eq!(weights, vec![0.25; 4]);

        mutate(&mut weights, 1.0, 0.1, &mut rng);
        assert!(weights.iter().all(|&w| w != 0.25 && (w - 0.25).abs() < 0.1));
    }

    #[test]
    fn test_generate_offsprings_are_repaired() {
        let mut rng = StdRng::seed_from_u64(5);
        let config = seeded_config(7, 1, 5);
        let population = vec![
            create_portfolio(0.1, 0.2, 0.3),
            create_portfolio(0.2, 0.1, 0.3),
        ];
        let offsprings = generate_offsprings(&population, 7, &config, 0.5, &mut rng);
        assert_eq!(offsprings.len(), 7);
        for offspring in offsprings.iter() {
            assert_feasible(&offspring.weights);
        }
    }

    #[test]
    fn test_invalid_profile_runs_no_evaluations() {
        let evaluator = CountingEvaluator {
            calls: AtomicUsize::new(0),
        };
        let result = optimize_portfolio(&evaluator, &seeded_config(10, 5, 1), "unknown");

        assert!(matches!(
            result,
            Err(OptimizationError::InvalidProfile(InvalidProfileError(ref id))) if id == "unknown"
        ));
        assert_eq!(evaluator.calls.load(AtomicOrdering::SeqCst), 0);

        optimize_portfolio(&evaluator, &seeded_config(10, 1, 1), "moderate").unwrap();
        assert_eq!(evaluator.calls.load(AtomicOrdering::SeqCst), 20);
    }

    #[test]
    fn test_negative_quadratic_form_is_not_fatal() {
        let inputs = MarketInputs::new(
            vec!["A".into(), "B".into()],
            vec![0.1, 0.05],
            vec![vec![0.01, -0.5], vec![-0.5, 0.01]],
            vec![0.0, 0.0],
        )
        .unwrap();
        let evaluator = MeanRiskSentiment::new(&inputs);
        let selected = optimize_portfolio(&evaluator, &seeded_config(10, 3, 8), "moderate").unwrap();
        assert_feasible(&selected.weights);
        assert!(selected.risk >= 0.);
        assert!(selected.evolution.clamped_risk_evaluations > 0);
    }

    #[test]
    fn test_single_asset_portfolio() {
        let inputs = MarketInputs::new(
            vec!["ONLY".into()],
            vec![0.07],
            vec![vec![0.03]],
            vec![0.2],
        )
        .unwrap();
        let evaluator = MeanRiskSentiment::new(&inputs);
        let selected =
            optimize_portfolio(&evaluator, &seeded_config(20, 10, 13), "aggressive").unwrap();
        assert_eq!(selected.weights, vec![1.0]);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let inputs = MarketInputs::new(
            vec!["A".into(), "B".into(), "C".into()],
            vec![0.10, 0.05, 0.08],
            vec![
                vec![0.04, 0.0, 0.0],
                vec![0.0, 0.01, 0.0],
                vec![0.0, 0.0, 0.02],
            ],
            vec![0.5, -0.2, 0.1],
        )
        .unwrap();
        let evaluator = MeanRiskSentiment::new(&inputs);

        let first = optimize_portfolio(&evaluator, &seeded_config(30, 15, 99), "moderate").unwrap();
        let mut more_threads = seeded_config(30, 15, 99);
        more_threads.max_concurrency = 4;
        let second = optimize_portfolio(&evaluator, &more_threads, "moderate").unwrap();

        assert_eq!(first.weights, second.weights);
        assert_eq!(first.evolution.resampled_candidates, 0);
        assert_eq!(first.evolution.clamped_risk_evaluations, 0);
        assert_eq!(first.evolution.generations_run, 15);
        assert_eq!(first.evolution.generation_summaries.len(), 15);
    }

    #[test]
    fn test_time_limit_stops_at_generation_boundary() {
        let evaluator = CountingEvaluator {
            calls: AtomicUsize::new(0),
        };
        let config = EvolutionConfig {
            time_limit_ms: Some(0),
            ..seeded_config(10, 50, 3)
        };
        let result = StandardParetoEvolution.evolve(&evaluator, &config).unwrap();
        assert_eq!(result.generations_run, 0);
        assert_eq!(evaluator.calls.load(AtomicOrdering::SeqCst), 10);
        assert!(!result.pareto_front.is_empty());
    }

    // Integration test: the return/sentiment leader should outweigh the laggard.
    #[test]
    fn test_aggressive_profile_favours_the_leading_asset() {
        let inputs = MarketInputs::new(
            vec!["A".into(), "B".into(), "C".into()],
            vec![0.10, 0.05, 0.08],
            vec![
                vec![0.04, 0.0, 0.0],
                vec![0.0, 0.01, 0.0],
                vec![0.0, 0.0, 0.02],
            ],
            vec![0.5, -0.2, 0.1],
        )
        .unwrap();
        let evaluator = MeanRiskSentiment::new(&inputs);
        let selected =
            optimize_portfolio(&evaluator, &seeded_config(100, 200, 42), "aggressive").unwrap();

        assert_feasible(&selected.weights);
        assert!(
            selected.weights[0] > selected.weights[1] + 0.1,
            "Asset A should get clearly more than asset B: {:?}",
            selected.weights
        );
        assert!(selected
            .evolution
            .pareto_front
            .iter()
            .all(|p| p.rank == Some(0)));
    }

    #[test]
    fn test_identical_assets_give_near_uniform_weights() {
        let inputs = MarketInputs::new(
            vec!["A".into(), "B".into(), "C".into()],
            vec![0.05, 0.05, 0.05],
            vec![
                vec![0.02, 0.0, 0.0],
                vec![0.0, 0.02, 0.0],
                vec![0.0, 0.0, 0.02],
            ],
            vec![0.1, 0.1, 0.1],
        )
        .unwrap();
        let evaluator = MeanRiskSentiment::new(&inputs);
        let selected =
            optimize_portfolio(&evaluator, &seeded_config(100, 200, 7), "moderate").unwrap();

        for &w in selected.weights.iter() {
            assert!(
                (w - 1. / 3.).abs() < 0.05,
                "Expected a near-uniform allocation, got {:?}",
                selected.weights
            );
        }
    }
}

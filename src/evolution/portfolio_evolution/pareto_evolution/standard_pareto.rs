use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::evolution::objective::ObjectiveEvaluator;
use crate::evolution::portfolio_evolution::{
    evaluate_offsprings, generate_offsprings, initialize_population,
    pareto_evolution::{build_pareto_fronts, select_survivors},
    summarize_population, EvolutionConfig, EvolutionResult, EvolutionStrategy, OptimizationError,
};
use crate::portfolio::Portfolio;

/// Elitist NSGA-II loop: parents and offspring compete for survival every generation.
pub struct StandardParetoEvolution;

impl EvolutionStrategy for StandardParetoEvolution {
    fn evolve<E: ObjectiveEvaluator>(
        &self,
        evaluator: &E,
        config: &EvolutionConfig,
    ) -> Result<EvolutionResult, OptimizationError> {
        // Initialization Phase
        let assets = evaluator.asset_count();
        config.validate(assets)?;
        let population_size = config.population_size;
        let generations = config.generations;
        let mutation_rate = config.effective_mutation_rate(assets);

        let mut rng = match config.global_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrency)
            .build()?;
        let time_limit = config.time_limit_ms.map(Duration::from_millis);
        let started = Instant::now();

        info!(
            assets,
            population_size, generations, mutation_rate, "Starting portfolio evolution."
        );

        let initial_population = initialize_population(config, assets, &mut rng)?;
        let mut resampled_candidates = initial_population.iter().filter(|o| o.resampled).count();
        let evaluated = evaluate_offsprings(evaluator, initial_population, &pool)?;
        let mut clamped_risk_evaluations = evaluated.clamped_risk;
        let mut population: Vec<Portfolio> = pool.install(|| {
            build_pareto_fronts(evaluated.portfolios)
                .into_iter()
                .flatten()
                .collect()
        });

        let mut generation_summaries = Vec::with_capacity(generations);
        for generation in 0..generations {
            if let Some(limit) = time_limit {
                if started.elapsed() >= limit {
                    warn!(
                        generation,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Time limit reached, stopping at the generation boundary."
                    );
                    break;
                }
            }

            let offsprings =
                generate_offsprings(&population, population_size, config, mutation_rate, &mut rng);
            resampled_candidates += offsprings.iter().filter(|o| o.resampled).count();
            let offsprings = evaluate_offsprings(evaluator, offsprings, &pool)?;
            clamped_risk_evaluations += offsprings.clamped_risk;

            // Merge & truncate: parents and offspring (2P) compete for P slots.
            population.extend(offsprings.portfolios);
            let (survivors, summary) = pool.install(|| {
                let survivors = select_survivors(build_pareto_fronts(population), population_size);
                let summary = summarize_population(&survivors);
                (survivors, summary)
            });
            population = survivors;
            debug!(
                generation,
                front_size = population.iter().filter(|p| p.rank == Some(0)).count(),
                best_return = summary.best_return,
                best_risk = summary.best_risk,
                best_sentiment = summary.best_sentiment,
                "Generation complete."
            );
            generation_summaries.push(summary);
        }

        // --- Final ranking of the surviving population ---
        let (final_summary, pareto_front) = pool.install(|| {
            let final_summary = summarize_population(&population);
            let pareto_front = build_pareto_fronts(population)
                .into_iter()
                .next()
                .unwrap_or_default();
            (final_summary, pareto_front)
        });
        if pareto_front.is_empty() {
            return Err(OptimizationError::EmptyParetoFront);
        }
        if clamped_risk_evaluations > 0 {
            warn!(
                clamped_risk_evaluations,
                "Covariance produced negative quadratic forms, risk was clamped to zero."
            );
        }

        info!(
            generations_run = generation_summaries.len(),
            front_size = pareto_front.len(),
            resampled_candidates,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Portfolio evolution finished."
        );

        Ok(EvolutionResult {
            generations_run: generation_summaries.len(),
            pareto_front,
            generation_summaries,
            final_summary,
            resampled_candidates,
            clamped_risk_evaluations,
        })
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use sentinel::advisor::{Advisor, HistoricalPrices, StaticSentiment};
use sentinel::EvolutionConfig;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

/// Recommends a portfolio allocation from a JSON request file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Request file with the assets, their price history and sentiment.
    #[arg(short, long)]
    request: PathBuf,
    /// Overrides the request's risk appetite.
    #[arg(long)]
    risk_appetite: Option<String>,
    #[arg(long)]
    population_size: Option<usize>,
    #[arg(long)]
    generations: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Writes the recommendation here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
struct AssetRequest {
    ticker: String,
    prices: Vec<f64>,
    sentiment: f64,
}

#[derive(Deserialize, Debug)]
struct RecommendationRequest {
    risk_appetite: String,
    assets: Vec<AssetRequest>,
    #[serde(default)]
    config: EvolutionConfig,
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let raw = fs::read_to_string(&cli.request)
        .with_context(|| format!("failed to read {}", cli.request.display()))?;
    let request: RecommendationRequest =
        serde_json::from_str(&raw).context("request file is not a valid recommendation request")?;

    let mut config = request.config;
    if let Some(population_size) = cli.population_size {
        config.population_size = population_size;
    }
    if let Some(generations) = cli.generations {
        config.generations = generations;
    }
    if cli.seed.is_some() {
        config.global_seed = cli.seed;
    }
    let risk_appetite = cli.risk_appetite.unwrap_or(request.risk_appetite);

    let tickers = request
        .assets
        .iter()
        .map(|asset| asset.ticker.clone())
        .collect::<Vec<_>>();
    let mut prices = HashMap::new();
    let mut scores = HashMap::new();
    for asset in request.assets {
        scores.insert(asset.ticker.clone(), asset.sentiment);
        prices.insert(asset.ticker, asset.prices);
    }

    let advisor = Advisor::new(
        HistoricalPrices::new(prices),
        StaticSentiment::new(scores),
        config,
    );
    let recommendation = advisor.recommend(&tickers, &risk_appetite)?;

    let json = serde_json::to_string_pretty(&recommendation)?;
    match cli.output {
        Some(path) => fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

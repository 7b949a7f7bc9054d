use dotenv::dotenv;
use futures::stream::{self, StreamExt};
use sentinel::{optimize_portfolio, EvolutionConfig, MarketInputs, MeanRiskSentiment, RiskAppetite};
use std::sync::Arc;
use std::{fs::File, io::Write, time::Instant};
use tokio::task;
use tracing_subscriber::EnvFilter;

// Runs one optimization per risk appetite side by side on the same read-only inputs.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let inputs = Arc::new(MarketInputs::new(
        vec!["ALPHA".into(), "BETA".into(), "GAMMA".into()],
        vec![0.10, 0.05, 0.08],
        vec![
            vec![0.04, 0.0, 0.0],
            vec![0.0, 0.01, 0.0],
            vec![0.0, 0.0, 0.02],
        ],
        vec![0.5, -0.2, 0.1],
    )?);
    let seed = 42; // a classic
    let base_config = EvolutionConfig {
        global_seed: Some(seed),
        // every run gets its own pool, so split the cores between them
        max_concurrency: (num_cpus::get() / RiskAppetite::ALL.len()).max(1),
        ..EvolutionConfig::default()
    };

    println!("Starting sweep: ");
    let start = Instant::now();

    stream::iter(RiskAppetite::ALL)
        .map(|risk_appetite| {
            let inputs = Arc::clone(&inputs);
            let config = base_config.clone();

            async move {
                let selected = task::spawn_blocking(move || {
                    let evaluator = MeanRiskSentiment::new(&inputs);
                    optimize_portfolio(&evaluator, &config, risk_appetite.as_str())
                })
                .await??;

                // offload blocking file I/O
                let filename = format!("selection_{risk_appetite}.json");
                let json = serde_json::to_string_pretty(&selected)?;
                task::spawn_blocking(move || {
                    let mut f = File::create(&filename)?;
                    f.write_all(json.as_bytes())?;
                    Ok::<_, std::io::Error>(())
                })
                .await??;

                anyhow::Ok((risk_appetite, selected))
            }
        })
        .buffer_unordered(RiskAppetite::ALL.len())
        .for_each(|res| async move {
            match res {
                Ok((risk_appetite, selected)) => {
                    println!(
                        "→ {}: weights = {:?}, return = {:.4}, risk = {:.4}, sentiment = {:.4}",
                        risk_appetite,
                        selected
                            .weights
                            .iter()
                            .map(|w| format!("{w:.3}"))
                            .collect::<Vec<_>>(),
                        selected.expected_return,
                        selected.risk,
                        selected.sentiment
                    );
                }
                Err(e) => eprintln!("run failed: {e:#}"),
            }
        })
        .await;

    println!("Total sweep time: {:.2?}", start.elapsed());
    Ok(())
}

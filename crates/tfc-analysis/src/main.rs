use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tfc_analysis::{comprehensive_report, AnalysisConfig, MarketCorpus};

#[derive(Parser, Debug)]
#[command(
    name = "tfc-analyze",
    about = "Market statistics over the query corpus - market structure, simulated auctions, hypothesis tests, ablation, baselines and noise robustness"
)]
struct Cli {
    /// Path to analysis configuration file
    #[arg(short, long, default_value = "config/tfc-analyze.toml")]
    config: String,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Override the random seed from the config
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config: {}", cli.config))?;
    let mut config: AnalysisConfig =
        toml::from_str(&config_str).with_context(|| "Failed to parse analysis config")?;
    if let Some(seed) = cli.seed {
        config.simulation.seed = seed;
    }

    let corpus = MarketCorpus::load(&config.data).context("Failed to load market data")?;
    let report = comprehensive_report(&corpus, &config.simulation)
        .context("Failed to build market report")?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{output}");

    Ok(())
}

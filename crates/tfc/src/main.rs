use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde_json::json;
use tfc_agents::bid_parser::{parse_bid_comments, parse_comment_listing};
use tfc_agents::{gh_cli, winner, BidEvaluator, ContractPoster, ScoringWeights, StrategyEngine};
use tfc_ledger::Ledger;
use tfc_models::config::MarketConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tfc",
    about = "TFC task marketplace - bidding, subcontracting and profit tracking for query agents"
)]
struct Cli {
    /// Path to configuration file. Defaults apply when it is absent.
    #[arg(short, long, default_value = "config/tfc.toml")]
    config: String,

    /// Pretty-print the output JSON
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide how one agent would handle a contract
    Analyze {
        #[arg(long)]
        query: String,
        #[arg(long)]
        budget: Decimal,
        #[arg(long)]
        agent: String,
        /// agent_knowledge_bases.json
        #[arg(long)]
        knowledge: String,
    },
    /// Rank the bids posted as comments on a contract
    Evaluate {
        #[arg(long)]
        budget: Decimal,
        /// Evaluate as this requester; scores owned by another requester are ignored
        #[arg(long)]
        requester: Option<String>,
        /// requester_trust_scores.json
        #[arg(long)]
        trust: String,
        /// Saved `gh issue view --json comments` output
        #[arg(long, conflicts_with = "issue")]
        comments: Option<String>,
        /// Issue number or URL to fetch comments from with gh
        #[arg(long)]
        issue: Option<String>,
    },
    /// Resolve a (possibly nested) query through the marketplace
    Chain {
        #[arg(long)]
        query: String,
        #[arg(long)]
        budget: Decimal,
        /// agent_knowledge_bases.json
        #[arg(long)]
        knowledge: String,
        /// requester_trust_scores.json used to rank bids
        #[arg(long)]
        trust: Option<String>,
        /// Post every contract as a GitHub issue
        #[arg(long)]
        publish: bool,
    },
    /// Show an agent's ledger account
    Profit {
        #[arg(long)]
        agent: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let output = match cli.command {
        Command::Analyze {
            query,
            budget,
            agent,
            knowledge,
        } => {
            let agents = tfc::load_agents(&knowledge)?;
            let Some(agent_knowledge) = agents.iter().find(|a| a.agent_id == agent) else {
                bail!("Agent {agent} not found in {knowledge}");
            };
            let strategy = StrategyEngine::new(config.strategy.clone())
                .analyze_contract(&query, budget, agent_knowledge)
                .context("Strategy analysis failed")?;
            serde_json::to_value(strategy)?
        }

        Command::Evaluate {
            budget,
            requester,
            trust,
            comments,
            issue,
        } => {
            let trust = tfc::load_trust(&trust, requester.as_deref())?;
            let bodies = match (comments, issue) {
                (Some(path), _) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read comments: {path}"))?;
                    parse_comment_listing(&raw).context("Failed to parse comment listing")?
                }
                (None, Some(issue)) => tfc::build_poster(&config)
                    .comments(&issue)
                    .await
                    .with_context(|| format!("Failed to fetch comments for {issue}"))?,
                (None, None) => bail!("One of --comments or --issue is required"),
            };

            let bids = parse_bid_comments(None, &bodies);
            let evaluator = BidEvaluator::new(ScoringWeights::from_config(&config.scoring));
            let evaluations = evaluator
                .evaluate(&bids, &trust, budget)
                .context("Bid evaluation failed")?;
            json!({
                "bids_found": bids.len(),
                "winner": winner(&evaluations).map(|w| w.agent_id.clone()),
                "evaluations": evaluations,
            })
        }

        Command::Chain {
            query,
            budget,
            knowledge,
            trust,
            publish,
        } => {
            let agents = tfc::load_agents(&knowledge)?;
            let mut market =
                tfc::build_marketplace(&config).context("Failed to build marketplace")?;
            if let Some(trust) = trust {
                market = market.with_trust(tfc::load_trust(&trust, None)?);
            }

            let root = market
                .post_primary(&query, budget)
                .context("Failed to post primary contract")?;
            let outcome = if publish {
                if !gh_cli::check_gh_available().await {
                    bail!("gh CLI is not installed or not authenticated");
                }
                let poster = tfc::build_poster(&config);
                market.run_published(root, &agents, &poster).await
            } else {
                market.run_contract(root, &agents)
            }
            .context("Chain resolution failed")?;
            serde_json::to_value(outcome)?
        }

        Command::Profit { agent } => {
            let ledger = Ledger::from_config(&config.ledger)
                .with_context(|| format!("Failed to open ledger: {}", config.ledger.path))?;
            let account = ledger.account(&agent)?;
            let net_profit = ledger.get_profit(&agent)?;
            json!({
                "agent_id": agent,
                "net_profit": net_profit,
                "account": account,
            })
        }
    };

    let output = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{output}");

    Ok(())
}

fn load_config(path: &str) -> Result<MarketConfig> {
    if !std::path::Path::new(path).exists() {
        tracing::debug!(path, "No config file, using defaults");
        return Ok(MarketConfig::default());
    }
    let config_str =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config: {path}"))?;
    toml::from_str(&config_str).with_context(|| "Failed to parse config")
}

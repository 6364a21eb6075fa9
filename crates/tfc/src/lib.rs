//! TFC - a decentralized task marketplace where agents bid TFC to answer
//! queries, subcontracting the hops of nested queries they cannot answer
//! alone.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use tfc::agents::{Marketplace, StrategyEngine, BidEvaluator, ContractPoster};
//! use tfc::ledger::Ledger;
//! use tfc::models::config::MarketConfig;
//! use tfc::analysis::{MarketCorpus, comprehensive_report};
//! ```

pub use tfc_agents as agents;
pub use tfc_analysis as analysis;
pub use tfc_ledger as ledger;
pub use tfc_models as models;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use tfc_agents::knowledge::{agents_from_bases, AgentKnowledge};
use tfc_agents::{GhIssuePoster, Marketplace};
use tfc_ledger::Ledger;
use tfc_models::config::MarketConfig;
use tfc_models::market_data::AgentKnowledgeBases;
use tfc_models::trust::TrustAssessment;

/// Build a Marketplace over the configured ledger backend.
pub fn build_marketplace(config: &MarketConfig) -> Result<Marketplace, anyhow::Error> {
    let ledger = Ledger::from_config(&config.ledger)
        .with_context(|| format!("Failed to open ledger: {}", config.ledger.path))?;
    Ok(Marketplace::from_config(config, Arc::new(ledger)))
}

/// Poster that files contracts as GitHub issues per the posting config.
pub fn build_poster(config: &MarketConfig) -> GhIssuePoster {
    GhIssuePoster::new((&config.posting).into())
}

/// Every agent's knowledge from an `agent_knowledge_bases.json` file.
pub fn load_agents(path: impl AsRef<Path>) -> Result<Vec<AgentKnowledge>, anyhow::Error> {
    let bases: AgentKnowledgeBases = read_json(path.as_ref())?;
    Ok(agents_from_bases(&bases))
}

/// A requester trust file, optionally viewed as a specific requester.
pub fn load_trust(
    path: impl AsRef<Path>,
    requester: Option<&str>,
) -> Result<TrustAssessment, anyhow::Error> {
    let trust: TrustAssessment = read_json(path.as_ref())?;
    Ok(match requester {
        Some(requester) => trust.for_requester(requester),
        None => trust,
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, anyhow::Error> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tfc_models::config::{LedgerBackend, LedgerConfig};

    const KNOWLEDGE: &str = r#"{
        "agents": {
            "Agent_A": {"knowledge": {"222": "10", "12": "22"}},
            "Agent_B": {"knowledge": {"10": "44", "34": "09"}}
        }
    }"#;

    fn config(dir: &Path, backend: LedgerBackend, file: &str) -> MarketConfig {
        MarketConfig {
            ledger: LedgerConfig {
                path: dir.join(file).to_string_lossy().to_string(),
                backend,
                create_if_missing: true,
            },
            ..MarketConfig::default()
        }
    }

    #[test]
    fn marketplace_runs_chain_over_configured_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let knowledge = dir.path().join("agent_knowledge_bases.json");
        std::fs::write(&knowledge, KNOWLEDGE).unwrap();

        let config = config(dir.path(), LedgerBackend::Json, "ledger/payment_ledger.json");
        let mut market = build_marketplace(&config).unwrap();
        let agents = load_agents(&knowledge).unwrap();

        let root = market
            .post_primary("What is response[response[222]]?", dec!(10))
            .unwrap();
        let outcome = market.run_contract(root, &agents).unwrap();
        assert!(outcome.resolved);
        assert_eq!(outcome.total_system_profit, dec!(9.4));

        let reopened = Ledger::open_json(&config.ledger.path).unwrap();
        assert_eq!(reopened.get_profit("Agent_A").unwrap(), dec!(7.0));
    }

    #[test]
    fn sqlite_backend_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), LedgerBackend::Sqlite, "ledger.db");
        let market = build_marketplace(&config).unwrap();
        assert_eq!(market.ledger().get_profit("Agent_A").unwrap(), dec!(0));
    }

    #[test]
    fn missing_json_ledger_fails_without_create() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), LedgerBackend::Json, "absent.json");
        config.ledger.create_if_missing = false;
        let err = build_marketplace(&config).err().unwrap();
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn shipped_config_parses() {
        let config: MarketConfig = toml::from_str(include_str!("../../../config/tfc.toml")).unwrap();
        assert_eq!(config.ledger.backend, LedgerBackend::Json);
        assert_eq!(config.strategy.profit_margin, dec!(0.7));
        assert_eq!(config.strategy.max_subcontract_depth, 8);
        assert_eq!(config.posting.subcontract_labels, vec!["subcontract", "query-task"]);
    }

    #[test]
    fn trust_for_other_requester_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requester_trust_scores.json");
        std::fs::write(
            &path,
            r#"{"requester_id": "dirk-ax", "trust_scores": {"Agent_A": {"score": 0.9, "based_on_jobs": 5}}}"#,
        )
        .unwrap();

        assert!(load_trust(&path, None).unwrap().record("Agent_A").is_some());
        assert!(load_trust(&path, Some("dirk-ax")).unwrap().record("Agent_A").is_some());
        assert!(load_trust(&path, Some("someone-else"))
            .unwrap()
            .record("Agent_A")
            .is_none());
    }
}

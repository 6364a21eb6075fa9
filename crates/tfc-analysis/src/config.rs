use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::simulation::BidStrategy;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Locations of the three market data files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    #[serde(default = "default_master_queries")]
    pub master_queries: String,
    #[serde(default = "default_knowledge_bases")]
    pub knowledge_bases: String,
    #[serde(default = "default_trust_scores")]
    pub trust_scores: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            master_queries: default_master_queries(),
            knowledge_bases: default_knowledge_bases(),
            trust_scores: default_trust_scores(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationConfig {
    /// Budget offered for every query in the corpus.
    #[serde(default = "default_budget")]
    pub budget: Decimal,
    #[serde(default = "default_trust_weight")]
    pub trust_weight: Decimal,
    #[serde(default)]
    pub strategy: BidStrategy,
    /// Trust weights swept by the ablation study.
    #[serde(default = "default_ablation_weights")]
    pub ablation_weights: Vec<Decimal>,
    /// Trust score assumed for bidders the requester has never rated.
    #[serde(default = "default_unrated_trust")]
    pub unrated_trust: Decimal,
    /// Seed for the Monte Carlo analyses and the random-selection baseline.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Noisy auctions per query at each noise level.
    #[serde(default = "default_noise_samples")]
    pub noise_samples: usize,
    /// Passes over the corpus for the winner distribution.
    #[serde(default = "default_monte_carlo_runs")]
    pub monte_carlo_runs: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            budget: default_budget(),
            trust_weight: default_trust_weight(),
            strategy: BidStrategy::default(),
            ablation_weights: default_ablation_weights(),
            unrated_trust: default_unrated_trust(),
            seed: default_seed(),
            noise_samples: default_noise_samples(),
            monte_carlo_runs: default_monte_carlo_runs(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), crate::AnalysisError> {
        if self.budget <= Decimal::ZERO {
            return Err(crate::AnalysisError::Config(format!(
                "simulation.budget must be positive, got {}",
                self.budget
            )));
        }
        let unit = Decimal::ZERO..=Decimal::ONE;
        if let Some(w) = std::iter::once(&self.trust_weight)
            .chain(&self.ablation_weights)
            .find(|w| !unit.contains(*w))
        {
            return Err(crate::AnalysisError::Config(format!(
                "trust weights must lie in [0, 1], got {w}"
            )));
        }
        Ok(())
    }
}

fn default_master_queries() -> String {
    "master_query_database.json".to_string()
}
fn default_knowledge_bases() -> String {
    "agent_knowledge_bases.json".to_string()
}
fn default_trust_scores() -> String {
    "requester_trust_scores.json".to_string()
}
fn default_budget() -> Decimal {
    Decimal::from(120)
}
fn default_trust_weight() -> Decimal {
    Decimal::new(6, 1)
}
fn default_ablation_weights() -> Vec<Decimal> {
    (0..=5).map(|i| Decimal::new(i * 2, 1)).collect()
}
fn default_unrated_trust() -> Decimal {
    Decimal::new(5, 1)
}
fn default_seed() -> u64 {
    42
}
fn default_noise_samples() -> usize {
    100
}
fn default_monte_carlo_runs() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn deserialize_example_config() {
        let toml_str = r#"
[data]
master_queries = "data/master_query_database.json"
knowledge_bases = "data/agent_knowledge_bases.json"
trust_scores = "data/requester_trust_scores.json"

[simulation]
budget = "100"
trust_weight = "0.5"
strategy = "aggressive"
seed = 7
ablation_weights = ["0.0", "0.5", "1.0"]
"#;
        let config: AnalysisConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.data.trust_scores, "data/requester_trust_scores.json");
        assert_eq!(config.simulation.budget, dec!(100));
        assert_eq!(config.simulation.strategy, BidStrategy::Aggressive);
        assert_eq!(config.simulation.ablation_weights.len(), 3);
        assert_eq!(config.simulation.unrated_trust, dec!(0.5));
        assert_eq!(config.simulation.seed, 7);
        assert_eq!(config.simulation.monte_carlo_runs, 1000);
        config.simulation.validate().unwrap();
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let config: AnalysisConfig =
            toml::from_str(include_str!("../../../config/tfc-analyze.toml")).unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: AnalysisConfig = toml::from_str("").unwrap();
        assert_eq!(config.data.master_queries, "master_query_database.json");
        assert_eq!(config.simulation.budget, dec!(120));
        assert_eq!(config.simulation.trust_weight, dec!(0.6));
        assert_eq!(
            config.simulation.ablation_weights,
            vec![dec!(0), dec!(0.2), dec!(0.4), dec!(0.6), dec!(0.8), dec!(1.0)]
        );
    }

    #[test]
    fn rejects_out_of_range_weights() {
        let config = SimulationConfig {
            ablation_weights: vec![dec!(0.2), dec!(1.5)],
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SimulationConfig {
            budget: dec!(0),
            ..SimulationConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the marketplace core.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarketConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub posting: PostingConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    #[default]
    Json,
    Sqlite,
}

/// Where the profit ledger lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerConfig {
    pub path: String,
    #[serde(default)]
    pub backend: LedgerBackend,
    /// Create an empty ledger when the file is missing instead of failing.
    #[serde(default)]
    pub create_if_missing: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: "agents/payment_ledger.json".to_string(),
            backend: LedgerBackend::Json,
            create_if_missing: false,
        }
    }
}

/// Pricing constants for the bidding strategy engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyConfig {
    /// Share of the budget bid when answering directly.
    #[serde(default = "default_direct_bid_ratio")]
    pub direct_bid_ratio: Decimal,
    /// Share of the budget kept when subcontracting the next hop.
    #[serde(default = "default_profit_margin")]
    pub profit_margin: Decimal,
    /// Deepest subcontract chain the marketplace will spawn.
    #[serde(default = "default_max_depth")]
    pub max_subcontract_depth: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            direct_bid_ratio: default_direct_bid_ratio(),
            profit_margin: default_profit_margin(),
            max_subcontract_depth: default_max_depth(),
        }
    }
}

fn default_direct_bid_ratio() -> Decimal {
    Decimal::new(8, 1)
}

fn default_profit_margin() -> Decimal {
    Decimal::new(7, 1)
}

fn default_max_depth() -> usize {
    8
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScoringVariant {
    /// trust 0.6, price 0.4.
    TwoFactor,
    /// trust 0.6, price 0.3, risk 0.1.
    #[default]
    ThreeFactor,
}

/// Bid scoring weights. Explicit weights override the variant's.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoringConfig {
    #[serde(default)]
    pub variant: ScoringVariant,
    pub trust_weight: Option<Decimal>,
    pub price_weight: Option<Decimal>,
    pub risk_weight: Option<Decimal>,
}

/// External issue-tracker posting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostingConfig {
    /// `owner/repo` passed to `gh --repo`. None uses the current checkout.
    pub repo: Option<String>,
    #[serde(default = "default_posting_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_primary_labels")]
    pub primary_labels: Vec<String>,
    #[serde(default = "default_subcontract_labels")]
    pub subcontract_labels: Vec<String>,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            repo: None,
            timeout_seconds: default_posting_timeout(),
            primary_labels: default_primary_labels(),
            subcontract_labels: default_subcontract_labels(),
        }
    }
}

fn default_posting_timeout() -> u64 {
    30
}

fn default_primary_labels() -> Vec<String> {
    vec!["query-task".to_string(), "enhancement".to_string()]
}

fn default_subcontract_labels() -> Vec<String> {
    vec!["subcontract".to_string(), "query-task".to_string()]
}

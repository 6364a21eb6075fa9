pub mod config;
pub mod contract;
pub mod ledger_schema;
pub mod market_data;
pub mod query;
pub mod trust;

pub use config::{
    LedgerBackend, LedgerConfig, MarketConfig, PostingConfig, ScoringConfig, ScoringVariant,
    StrategyConfig,
};
pub use contract::{Bid, Contract, ContractId, ContractKind, ContractStatus};
pub use ledger_schema::{AgentAccount, EntryKind, LedgerDocument, LedgerEntry};
pub use market_data::{AgentKnowledgeBases, AgentKnowledgeRecord, KnowledgeValue, MasterQueryDatabase};
pub use query::{DependencyChain, ParsedQuery};
pub use trust::{RiskPolicy, TrustAssessment, TrustRecord};

pub mod bid_parser;
pub mod error;
pub mod evaluator;
pub mod gh_cli;
pub mod knowledge;
pub mod marketplace;
pub mod poster;
pub mod resolver;
pub mod strategy;
pub mod templates;

pub mod test_support;

pub use error::AgentError;
pub use evaluator::{winner, BidEvaluation, BidEvaluator, BidStatus, ScoringWeights};
pub use knowledge::{AgentKnowledge, KnowledgeIndex};
pub use marketplace::{ChainOutcome, ContractTree, Marketplace};
pub use poster::{ContractPoster, GhIssuePoster};
pub use resolver::{can_solve_first_hop, parse, FirstHop};
pub use strategy::{Strategy, StrategyEngine};

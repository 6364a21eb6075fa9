pub mod config;
pub mod corpus;
pub mod error;
pub mod market;
pub mod noise;
pub mod report;
pub mod simulation;
pub mod stats;

pub use config::AnalysisConfig;
pub use corpus::MarketCorpus;
pub use error::AnalysisError;
pub use market::{classify, MarketDistribution, MarketType};
pub use report::{comprehensive_report, ComprehensiveReport};
pub use simulation::{simulate_bid, BidStrategy, Simulator};

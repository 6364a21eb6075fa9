use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tfc_models::config::StrategyConfig;
use tracing::debug;

use crate::error::AgentError;
use crate::knowledge::AgentKnowledge;
use crate::resolver::{can_solve_first_hop, nested_expression, FirstHop};

/// What one agent intends to do about one contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Strategy {
    CannotBid {
        reason: String,
    },
    BidDirectly {
        #[serde(with = "rust_decimal::serde::float")]
        bid_amount: Decimal,
        #[serde(with = "rust_decimal::serde::float")]
        expected_profit: Decimal,
    },
    Subcontract {
        subcontract_query: String,
        #[serde(with = "rust_decimal::serde::float")]
        subcontract_budget: Decimal,
        #[serde(with = "rust_decimal::serde::float")]
        expected_revenue: Decimal,
        #[serde(with = "rust_decimal::serde::float")]
        expected_cost: Decimal,
        #[serde(with = "rust_decimal::serde::float")]
        expected_profit: Decimal,
        #[serde(with = "rust_decimal::serde::float")]
        profit_margin: Decimal,
    },
    /// Terminal state set by the marketplace once a contract is delivered.
    Completed {
        response: String,
    },
}

impl Strategy {
    pub fn action(&self) -> &'static str {
        match self {
            Self::CannotBid { .. } => "cannot_bid",
            Self::BidDirectly { .. } => "bid_directly",
            Self::Subcontract { .. } => "subcontract",
            Self::Completed { .. } => "completed",
        }
    }

    pub fn expected_profit(&self) -> Decimal {
        match self {
            Self::BidDirectly {
                expected_profit, ..
            }
            | Self::Subcontract {
                expected_profit, ..
            } => *expected_profit,
            _ => Decimal::ZERO,
        }
    }
}

/// Fixed-margin pricing heuristic.
///
/// A single-hop query the agent knows is bid at `direct_bid_ratio` of the
/// budget. A multi-hop query whose first hop the agent knows keeps
/// `profit_margin` of the budget and posts the rest as a subcontract for
/// the remaining hops.
#[derive(Debug, Clone, Default)]
pub struct StrategyEngine {
    config: StrategyConfig,
}

impl StrategyEngine {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn analyze_contract(
        &self,
        query: &str,
        budget: Decimal,
        knowledge: &AgentKnowledge,
    ) -> Result<Strategy, AgentError> {
        if budget <= Decimal::ZERO {
            return Err(AgentError::InvalidInput(format!(
                "budget must be positive, got {budget}"
            )));
        }

        let strategy = match can_solve_first_hop(query, knowledge) {
            FirstHop::Unresolvable => Strategy::CannotBid {
                reason: "Query has no resolvable reference".to_string(),
            },
            FirstHop::Unknown => Strategy::CannotBid {
                reason: "Cannot solve first hop".to_string(),
            },
            FirstHop::Direct => {
                let bid_amount = budget * self.config.direct_bid_ratio;
                Strategy::BidDirectly {
                    bid_amount,
                    expected_profit: bid_amount,
                }
            }
            FirstHop::NeedsNextHop {
                value,
                remaining_depth,
            } => {
                let margin = self.config.profit_margin;
                let subcontract_budget = budget * (Decimal::ONE - margin);
                Strategy::Subcontract {
                    subcontract_query: format!(
                        "What is {}?",
                        nested_expression(&value, remaining_depth)
                    ),
                    subcontract_budget,
                    expected_revenue: budget,
                    expected_cost: subcontract_budget,
                    expected_profit: budget * margin,
                    profit_margin: margin,
                }
            }
        };

        debug!(
            agent = %knowledge.agent_id,
            query = %query,
            budget = %budget,
            action = strategy.action(),
            "Analyzed contract"
        );
        Ok(strategy)
    }
}

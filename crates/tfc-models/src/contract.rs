use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Index of a contract inside a contract tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ContractId(pub usize);

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractKind {
    Primary,
    Subcontract,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    Open,
    Awarded,
    Completed,
}

/// A unit of work agents bid on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contract {
    pub id: ContractId,
    /// Stable identifier used in ledger entries and tracker bodies.
    pub uid: Uuid,
    pub query: String,
    pub budget: Decimal,
    pub kind: ContractKind,
    pub status: ContractStatus,
    /// SUBCONTRACT_OF back-reference. Lookup only; the tree owns every node.
    pub parent: Option<ContractId>,
    /// Agent that posted a subcontract. None for requester-posted primaries.
    pub posted_by: Option<String>,
    /// Reference returned by the external tracker, once published.
    pub reference: Option<String>,
    pub awarded_to: Option<String>,
    pub winning_amount: Option<Decimal>,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Contract {
    /// Label used as the ledger's contract reference.
    pub fn ledger_ref(&self) -> String {
        self.reference
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.id, self.uid))
    }
}

/// An agent's commitment to a contract. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bid {
    pub agent_id: String,
    pub contract: Option<ContractId>,
    pub amount: Decimal,
    #[serde(default)]
    pub capability_passed: bool,
    #[serde(default)]
    pub strategy: Option<String>,
}

impl Bid {
    pub fn new(agent_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            agent_id: agent_id.into(),
            contract: None,
            amount,
            capability_passed: true,
            strategy: None,
        }
    }

    pub fn for_contract(mut self, contract: ContractId) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn without_capability(mut self) -> Self {
        self.capability_passed = false;
        self
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }
}

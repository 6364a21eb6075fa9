use thiserror::Error;

use tfc_models::contract::{ContractId, ContractStatus};

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Query cannot be resolved: {0}")]
    UnresolvableQuery(String),

    #[error("Subcontract cycle: {query} already appears in the chain above {parent}")]
    CycleDetected { query: String, parent: ContractId },

    #[error("Contract not found: {0}")]
    ContractNotFound(ContractId),

    #[error("Contract {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: ContractId,
        from: ContractStatus,
        to: ContractStatus,
    },

    #[error("Posting failed: {0}")]
    PostingFailed(String),

    #[error("gh timed out after {0} seconds")]
    Timeout(u64),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] tfc_ledger::LedgerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

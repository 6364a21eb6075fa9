use std::collections::BTreeMap;

use tfc_models::ledger_schema::{AgentAccount, LedgerEntry};

use crate::error::LedgerError;

/// Durable backing store for the ledger.
///
/// `append` must apply the entry and persist the result as one step: on
/// return the entry is durable, on error nothing was written.
pub trait LedgerStore: Send {
    /// Append `entry` to `agent_id`'s history and return the updated account.
    fn append(&mut self, agent_id: &str, entry: LedgerEntry) -> Result<AgentAccount, LedgerError>;

    fn account(&self, agent_id: &str) -> Result<Option<AgentAccount>, LedgerError>;

    fn accounts(&self) -> Result<BTreeMap<String, AgentAccount>, LedgerError>;
}

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rust_decimal::Decimal;
use tfc_models::config::{LedgerBackend, LedgerConfig};
use tfc_models::ledger_schema::{AgentAccount, LedgerEntry};
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::json_store::JsonFileStore;
use crate::sqlite::SqliteStore;
use crate::store::LedgerStore;

/// Profit/loss ledger shared by every agent in a run.
///
/// Passed around by reference; all mutation goes through `record_revenue`
/// and `record_cost`. Each call appends one entry and persists it before
/// returning, so net profit always equals revenue minus costs on disk.
pub struct Ledger {
    store: Mutex<Box<dyn LedgerStore>>,
}

impl Ledger {
    pub fn new(store: impl LedgerStore + 'static) -> Self {
        Self {
            store: Mutex::new(Box::new(store)),
        }
    }

    /// Open the JSON ledger file. Fails if the file is missing or corrupt.
    pub fn open_json(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        Ok(Self::new(JsonFileStore::open(path)?))
    }

    pub fn open_sqlite(path: &str) -> Result<Self, LedgerError> {
        Ok(Self::new(SqliteStore::open(path)?))
    }

    /// In-memory SQLite ledger. Useful for testing and dry runs.
    pub fn in_memory() -> Result<Self, LedgerError> {
        Ok(Self::new(SqliteStore::open_in_memory()?))
    }

    /// Open the ledger described by configuration.
    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        match config.backend {
            LedgerBackend::Json if config.create_if_missing => {
                Ok(Self::new(JsonFileStore::create(&config.path)?))
            }
            LedgerBackend::Json => Self::open_json(&config.path),
            LedgerBackend::Sqlite => Self::open_sqlite(&config.path),
        }
    }

    /// Record revenue earned by `agent_id` for completing `contract_id`.
    pub fn record_revenue(
        &self,
        agent_id: &str,
        contract_id: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<AgentAccount, LedgerError> {
        validate_amount(amount)?;
        let account = self.lock()?.append(
            agent_id,
            LedgerEntry::revenue(contract_id, amount, description),
        )?;
        info!(agent = %agent_id, contract = %contract_id, amount = %amount, net_profit = %account.net_profit, "Recorded revenue");
        Ok(account)
    }

    /// Record a cost paid by `agent_id` to `paid_to`, e.g. for a subcontract.
    pub fn record_cost(
        &self,
        agent_id: &str,
        contract_id: &str,
        amount: Decimal,
        paid_to: &str,
        description: &str,
    ) -> Result<AgentAccount, LedgerError> {
        validate_amount(amount)?;
        let account = self.lock()?.append(
            agent_id,
            LedgerEntry::cost(contract_id, amount, paid_to, description),
        )?;
        info!(agent = %agent_id, contract = %contract_id, amount = %amount, paid_to = %paid_to, net_profit = %account.net_profit, "Recorded cost");
        Ok(account)
    }

    /// Current net profit. Unknown agents have zero.
    pub fn get_profit(&self, agent_id: &str) -> Result<Decimal, LedgerError> {
        let profit = self
            .lock()?
            .account(agent_id)?
            .map(|a| a.net_profit)
            .unwrap_or(Decimal::ZERO);
        debug!(agent = %agent_id, profit = %profit, "Profit lookup");
        Ok(profit)
    }

    pub fn account(&self, agent_id: &str) -> Result<Option<AgentAccount>, LedgerError> {
        self.lock()?.account(agent_id)
    }

    /// Snapshot of every account.
    pub fn accounts(&self) -> Result<BTreeMap<String, AgentAccount>, LedgerError> {
        self.lock()?.accounts()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Box<dyn LedgerStore>>, LedgerError> {
        self.store
            .lock()
            .map_err(|e| LedgerError::Lock(format!("Ledger mutex poisoned: {e}")))
    }
}

fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(LedgerError::InvalidAmount(amount.to_string()));
    }
    Ok(())
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// SQLite layout used by the transactional ledger store.
///
/// Amounts are stored as decimal TEXT so totals stay exact.
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS ledger_accounts (
///     agent_id       TEXT PRIMARY KEY,
///     total_revenue  TEXT NOT NULL,
///     total_costs    TEXT NOT NULL,
///     net_profit     TEXT NOT NULL
/// );
///
/// CREATE TABLE IF NOT EXISTS ledger_transactions (
///     id           INTEGER PRIMARY KEY AUTOINCREMENT,
///     agent_id     TEXT NOT NULL,
///     kind         TEXT NOT NULL,
///     contract_id  TEXT NOT NULL,
///     amount       TEXT NOT NULL,
///     paid_to      TEXT,
///     description  TEXT NOT NULL,
///     recorded_at  TEXT
/// );
///
/// CREATE INDEX IF NOT EXISTS idx_ledger_tx_agent ON ledger_transactions(agent_id);
/// ```
pub const LEDGER_TABLE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS ledger_accounts (
    agent_id       TEXT PRIMARY KEY,
    total_revenue  TEXT NOT NULL,
    total_costs    TEXT NOT NULL,
    net_profit     TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS ledger_transactions (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id     TEXT NOT NULL,
    kind         TEXT NOT NULL,
    contract_id  TEXT NOT NULL,
    amount       TEXT NOT NULL,
    paid_to      TEXT,
    description  TEXT NOT NULL,
    recorded_at  TEXT
);
CREATE INDEX IF NOT EXISTS idx_ledger_tx_agent ON ledger_transactions(agent_id);
";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Revenue,
    Cost,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Cost => "cost",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "revenue" => Some(Self::Revenue),
            "cost" => Some(Self::Cost),
            _ => None,
        }
    }
}

/// One appended transaction. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub contract_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Counterparty paid, for costs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_to: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn revenue(contract_id: &str, amount: Decimal, description: &str) -> Self {
        Self {
            kind: EntryKind::Revenue,
            contract_id: contract_id.to_string(),
            amount,
            paid_to: None,
            description: description.to_string(),
            recorded_at: Some(Utc::now()),
        }
    }

    pub fn cost(contract_id: &str, amount: Decimal, paid_to: &str, description: &str) -> Self {
        Self {
            kind: EntryKind::Cost,
            contract_id: contract_id.to_string(),
            amount,
            paid_to: Some(paid_to.to_string()),
            description: description.to_string(),
            recorded_at: Some(Utc::now()),
        }
    }
}

/// Per-agent totals plus full transaction history.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentAccount {
    #[serde(with = "rust_decimal::serde::float")]
    pub total_revenue: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_costs: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_profit: Decimal,
    #[serde(default)]
    pub transactions: Vec<LedgerEntry>,
}

impl AgentAccount {
    /// Append an entry and recompute `net_profit`.
    pub fn apply(&mut self, entry: LedgerEntry) {
        match entry.kind {
            EntryKind::Revenue => self.total_revenue += entry.amount,
            EntryKind::Cost => self.total_costs += entry.amount,
        }
        self.net_profit = self.total_revenue - self.total_costs;
        self.transactions.push(entry);
    }
}

/// The persisted ledger document: `{"agents": {id: AgentAccount}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LedgerDocument {
    #[serde(default)]
    pub agents: BTreeMap<String, AgentAccount>,
}

impl LedgerDocument {
    /// Accounts are created lazily with zero totals.
    pub fn account_mut(&mut self, agent_id: &str) -> &mut AgentAccount {
        self.agents.entry(agent_id.to_string()).or_default()
    }
}

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use rust_decimal::Decimal;
use tfc_models::ledger_schema::{AgentAccount, EntryKind, LedgerEntry, LEDGER_TABLE_DDL};

use crate::error::LedgerError;
use crate::store::LedgerStore;

/// Transactional ledger store backed by SQLite.
///
/// Every append runs inside one SQLite transaction, so a crash or a
/// concurrent writer never observes a half-applied entry.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a ledger database. Creates the schema and enables WAL.
    pub fn open(path: &str) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(LEDGER_TABLE_DDL)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(LEDGER_TABLE_DDL)?;
        Ok(Self { conn })
    }

    fn load_account(conn: &Connection, agent_id: &str) -> Result<Option<AgentAccount>, LedgerError> {
        let totals = conn
            .query_row(
                "SELECT total_revenue, total_costs, net_profit FROM ledger_accounts WHERE agent_id = ?1",
                rusqlite::params![agent_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((revenue, costs, net)) = totals else {
            return Ok(None);
        };

        Ok(Some(AgentAccount {
            total_revenue: parse_decimal(&revenue)?,
            total_costs: parse_decimal(&costs)?,
            net_profit: parse_decimal(&net)?,
            transactions: Self::load_transactions(conn, agent_id)?,
        }))
    }

    fn load_transactions(conn: &Connection, agent_id: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut stmt = conn.prepare_cached(
            "SELECT kind, contract_id, amount, paid_to, description, recorded_at \
             FROM ledger_transactions WHERE agent_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(rusqlite::params![agent_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(kind, contract_id, amount, paid_to, description, recorded_at)| {
                let kind = EntryKind::parse(&kind)
                    .ok_or_else(|| LedgerError::Corrupt(format!("unknown entry kind: {kind}")))?;
                let recorded_at = recorded_at
                    .map(|ts| {
                        DateTime::parse_from_rfc3339(&ts)
                            .map(|dt| dt.with_timezone(&Utc))
                            .map_err(|e| LedgerError::Corrupt(format!("recorded_at {ts}: {e}")))
                    })
                    .transpose()?;
                Ok(LedgerEntry {
                    kind,
                    contract_id,
                    amount: parse_decimal(&amount)?,
                    paid_to,
                    description,
                    recorded_at,
                })
            })
            .collect()
    }
}

impl LedgerStore for SqliteStore {
    fn append(&mut self, agent_id: &str, entry: LedgerEntry) -> Result<AgentAccount, LedgerError> {
        let tx = self.conn.transaction()?;

        let mut account = Self::load_account(&tx, agent_id)?.unwrap_or_default();
        let row = entry.clone();
        account.apply(entry);

        tx.execute(
            "INSERT OR REPLACE INTO ledger_accounts \
             (agent_id, total_revenue, total_costs, net_profit) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                agent_id,
                account.total_revenue.to_string(),
                account.total_costs.to_string(),
                account.net_profit.to_string(),
            ],
        )?;
        tx.execute(
            "INSERT INTO ledger_transactions \
             (agent_id, kind, contract_id, amount, paid_to, description, recorded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                agent_id,
                row.kind.as_str(),
                row.contract_id,
                row.amount.to_string(),
                row.paid_to,
                row.description,
                row.recorded_at.map(|ts| ts.to_rfc3339()),
            ],
        )?;

        tx.commit()?;
        Ok(account)
    }

    fn account(&self, agent_id: &str) -> Result<Option<AgentAccount>, LedgerError> {
        Self::load_account(&self.conn, agent_id)
    }

    fn accounts(&self) -> Result<BTreeMap<String, AgentAccount>, LedgerError> {
        let ids = {
            let mut stmt = self
                .conn
                .prepare_cached("SELECT agent_id FROM ledger_accounts ORDER BY agent_id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        let mut accounts = BTreeMap::new();
        for id in ids {
            if let Some(account) = Self::load_account(&self.conn, &id)? {
                accounts.insert(id, account);
            }
        }
        Ok(accounts)
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal, LedgerError> {
    Decimal::from_str(raw).map_err(|e| LedgerError::Corrupt(format!("amount {raw}: {e}")))
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Ledger file corrupt: {0}")]
    Corrupt(String),

    #[error("Ledger lock error: {0}")]
    Lock(String),

    #[error("Invalid ledger amount: {0}")]
    InvalidAmount(String),
}

pub mod error;
pub mod json_store;
pub mod ledger;
pub mod sqlite;
pub mod store;

pub use error::LedgerError;
pub use json_store::JsonFileStore;
pub use ledger::Ledger;
pub use sqlite::SqliteStore;
pub use store::LedgerStore;

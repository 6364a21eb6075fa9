use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;
use tfc_models::ledger_schema::{AgentAccount, LedgerDocument, LedgerEntry};
use tracing::debug;

use crate::error::LedgerError;
use crate::store::LedgerStore;

/// Ledger persisted as a single JSON document (`{"agents": {...}}`).
///
/// Each append runs a locked read-modify-write: an exclusive advisory lock
/// on a sidecar `<file>.lock`, a fresh read of the document, and an atomic
/// replace through a temp file in the same directory. Concurrent processes
/// therefore serialise instead of losing updates. Reads take a shared lock
/// and always see the file as it is now, not as this handle last wrote it.
pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    /// Open an existing ledger file. A missing or unparseable file is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let doc = read_document(&path)?;
        debug!(path = %path.display(), agents = doc.agents.len(), "Opened JSON ledger");
        Ok(Self {
            lock_path: lock_path_for(&path),
            path,
        })
    }

    /// Open the ledger, writing an empty document first if the file is missing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        if !path.exists() {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            write_document(path, &LedgerDocument::default())?;
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self, exclusive: bool) -> Result<File, LedgerError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        let locked = if exclusive {
            file.lock_exclusive()
        } else {
            file.lock_shared()
        };
        locked.map_err(|e| self.lock_error(e))?;
        Ok(file)
    }

    fn unlock(&self, lock: &File) -> Result<(), LedgerError> {
        FileExt::unlock(lock).map_err(|e| self.lock_error(e))
    }

    fn lock_error(&self, e: std::io::Error) -> LedgerError {
        LedgerError::Lock(format!("{}: {e}", self.lock_path.display()))
    }

    /// Current document, read under a shared lock.
    fn snapshot(&self) -> Result<LedgerDocument, LedgerError> {
        let lock = self.lock(false)?;
        let doc = read_document(&self.path);
        self.unlock(&lock)?;
        doc
    }
}

impl LedgerStore for JsonFileStore {
    fn append(&mut self, agent_id: &str, entry: LedgerEntry) -> Result<AgentAccount, LedgerError> {
        let lock = self.lock(true)?;

        let result = (|| -> Result<LedgerDocument, LedgerError> {
            let mut doc = read_document(&self.path)?;
            doc.account_mut(agent_id).apply(entry);
            write_document(&self.path, &doc)?;
            Ok(doc)
        })();

        self.unlock(&lock)?;

        let mut doc = result?;
        Ok(doc.agents.remove(agent_id).unwrap_or_default())
    }

    fn account(&self, agent_id: &str) -> Result<Option<AgentAccount>, LedgerError> {
        Ok(self.snapshot()?.agents.remove(agent_id))
    }

    fn accounts(&self) -> Result<BTreeMap<String, AgentAccount>, LedgerError> {
        Ok(self.snapshot()?.agents)
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

fn read_document(path: &Path) -> Result<LedgerDocument, LedgerError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| LedgerError::Corrupt(format!("{}: {e}", path.display())))
}

fn write_document(path: &Path, doc: &LedgerDocument) -> Result<(), LedgerError> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, doc)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| LedgerError::Io(e.error))?;
    Ok(())
}

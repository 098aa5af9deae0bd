use crate::ledger::Ledger;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// The ledger lives under one fixed document id
pub const LEDGER_KEY: &str = "ledger";

/// Whole-document persistence: load the ledger, or replace it wholesale.
/// No versioning and no partial updates.
pub trait LedgerStore {
    fn load(&self) -> Result<Option<Ledger>>;

    fn save(&mut self, ledger: &Ledger) -> Result<()>;

    /// Load the stored ledger, creating and persisting a fresh one on first access
    fn load_or_init(&mut self) -> Result<Ledger> {
        if let Some(ledger) = self.load()? {
            return Ok(ledger);
        }

        let ledger = Ledger::default();
        self.save(&ledger)?;
        tracing::info!("initialized empty ledger document");
        Ok(ledger)
    }
}

/// Lets a short-lived session borrow a long-lived store (e.g. behind a server mutex)
impl<T: LedgerStore + ?Sized> LedgerStore for &mut T {
    fn load(&self) -> Result<Option<Ledger>> {
        (**self).load()
    }

    fn save(&mut self, ledger: &Ledger) -> Result<()> {
        (**self).save(ledger)
    }
}

// ============================================================================
// SQLITE
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Ledger document stored as a JSON row in SQLite
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn).context("Failed to set up database schema")?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl LedgerStore for SqliteStore {
    fn load(&self) -> Result<Option<Ledger>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE id = ?1",
                params![LEDGER_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(json) => {
                let ledger: Ledger =
                    serde_json::from_str(&json).context("Failed to deserialize ledger document")?;
                tracing::debug!(transactions = ledger.transactions.len(), "loaded ledger");
                Ok(Some(ledger))
            }
            None => Ok(None),
        }
    }

    fn save(&mut self, ledger: &Ledger) -> Result<()> {
        let body = serde_json::to_string(ledger)?;

        self.conn.execute(
            "INSERT INTO documents (id, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![LEDGER_KEY, body, Utc::now().to_rfc3339()],
        )?;

        tracing::debug!(transactions = ledger.transactions.len(), "saved ledger");
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

/// Keeps the document as serialized JSON so it goes through the same codec as SQLite
#[derive(Debug, Default)]
pub struct MemoryStore {
    body: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<Option<Ledger>> {
        self.body
            .as_deref()
            .map(|json| serde_json::from_str(json).context("Failed to deserialize ledger document"))
            .transpose()
    }

    fn save(&mut self, ledger: &Ledger) -> Result<()> {
        self.body = Some(serde_json::to_string(ledger)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PartyRole;
    use crate::rules::TransactionKind;
    use rust_decimal_macros::dec;

    fn sample_ledger() -> Ledger {
        Ledger::default()
            .apply(PartyRole::PersonA, TransactionKind::SelfPaidSplit, dec!(20), "dinner", Utc::now())
            .unwrap()
            .apply(PartyRole::PersonB, TransactionKind::OtherPaidFull, dec!(12.5), "", Utc::now())
            .unwrap()
    }

    fn document_count(store: &SqliteStore) -> i64 {
        store
            .connection()
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_load_empty_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_load_or_init_persists_default() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let ledger = store.load_or_init().unwrap();
        assert_eq!(ledger, Ledger::default());
        assert_eq!(document_count(&store), 1);

        // Second access reads the stored document instead of creating another
        store.load_or_init().unwrap();
        assert_eq!(document_count(&store), 1);
    }

    #[test]
    fn test_save_replaces_document() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.save(&Ledger::default()).unwrap();

        let ledger = sample_ledger();
        store.save(&ledger).unwrap();

        assert_eq!(document_count(&store), 1);
        assert_eq!(store.load().unwrap(), Some(ledger));
    }

    #[test]
    fn test_sub_cent_balance_survives_storage() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let ledger = Ledger::default()
            .apply(PartyRole::PersonA, TransactionKind::SelfPaidSplit, dec!(0.01), "", Utc::now())
            .unwrap();

        store.save(&ledger).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded.party_a.balance, dec!(0.005));
        assert!(loaded.is_balanced());
    }

    #[test]
    fn test_corrupt_document_is_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO documents (id, body, updated_at) VALUES (?1, ?2, ?3)",
                params![LEDGER_KEY, "{\"party_a\": 1}", "now"],
            )
            .unwrap();

        assert!(store.load().is_err());
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());

        let ledger = sample_ledger();
        store.save(&ledger).unwrap();
        assert_eq!(store.load().unwrap(), Some(ledger));
    }
}

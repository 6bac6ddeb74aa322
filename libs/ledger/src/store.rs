//! SQLite-backed ledger store.
//!
//! One [`Store`] owns one connection. Separate processes pointed at the same
//! file each open their own; SQLite arbitrates between them and the
//! allocation path reports any collision as [`LedgerError::CounterRace`].

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::debug;
use uidassign_id::{AssignedId, CounterClass, StableIdentity};

use crate::counter::{self, CounterState};
use crate::error::LedgerError;
use crate::ledger::{self, LedgerEntry};
use crate::schema::{self, CounterSeeds, SchemaReport};

/// SQLite ledger store.
#[derive(Debug)]
pub struct Store {
    pub(crate) conn: Connection,
    opened_with: SchemaReport,
}

impl Store {
    /// Open or create a store at the given path.
    ///
    /// Missing tables are created and the counter row is seeded from `seeds`;
    /// an existing store keeps its counters.
    pub fn open<P: AsRef<Path>>(path: P, seeds: &CounterSeeds) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;

        // WAL lets lookups proceed while another process holds the write lock
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        debug!(path = %path.display(), "Opening ledger store");
        Self::with_connection(conn, seeds)
    }

    /// Open an existing store for reading only.
    ///
    /// Never creates the file or any table. Fails with
    /// [`LedgerError::Schema`] unless the store has been initialized.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        debug!(path = %path.display(), "Opening ledger store read-only");
        schema::verify_schema(&conn)?;
        Ok(Self {
            conn,
            opened_with: SchemaReport::default(),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory(seeds: &CounterSeeds) -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, seeds)
    }

    fn with_connection(mut conn: Connection, seeds: &CounterSeeds) -> Result<Self, LedgerError> {
        let opened_with = schema::ensure_schema(&mut conn, seeds)?;
        Ok(Self { conn, opened_with })
    }

    /// What bootstrap changed when this store was opened.
    pub fn schema_report(&self) -> SchemaReport {
        self.opened_with
    }

    /// How long to wait on another process's lock before reporting a race.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), LedgerError> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Assigned ID for `identity`, or `None` if it was never assigned.
    pub fn lookup(&self, identity: &StableIdentity) -> Result<Option<AssignedId>, LedgerError> {
        ledger::lookup(&self.conn, identity)
    }

    /// Full ledger entry for `identity`.
    pub fn entry(&self, identity: &StableIdentity) -> Result<Option<LedgerEntry>, LedgerError> {
        ledger::entry(&self.conn, identity)
    }

    /// Insert a ledger entry directly, without touching any counter.
    ///
    /// Fails with [`LedgerError::LedgerConflict`] if the identity is already
    /// present. Allocation goes through [`Store::get_or_create_id`]; this is
    /// for importing assignments made elsewhere.
    pub fn record(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        ledger::record(&self.conn, entry)
    }

    /// All ledger entries, optionally for one class only.
    pub fn list_entries(
        &self,
        class: Option<CounterClass>,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        ledger::list(&self.conn, class)
    }

    /// Number of entries drawn from `class`.
    pub fn count_entries(&self, class: CounterClass) -> Result<u64, LedgerError> {
        ledger::count(&self.conn, class)
    }

    /// Current counter registry row.
    pub fn counters(&self) -> Result<CounterState, LedgerError> {
        counter::read_all(&self.conn)
    }

    /// Next raw value for one class.
    pub fn next_value(&self, class: CounterClass) -> Result<i64, LedgerError> {
        counter::read_next(&self.conn, class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_open_in_memory() {
        let store = Store::open_in_memory(&CounterSeeds::default()).unwrap();
        assert!(store.schema_report().created_counter);
        assert!(store.schema_report().created_ledger);

        let state = store.counters().unwrap();
        assert_eq!(state.next_user_id, 10_000);
        assert_eq!(state.next_group_id, 10_000);
        assert!(store.list_entries(None).unwrap().is_empty());
    }

    #[test]
    fn test_store_reopen_keeps_counters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.sqlite");

        {
            let store = Store::open(&path, &CounterSeeds::default()).unwrap();
            store
                .conn
                .execute("UPDATE NextId SET NextGroupId = 10123 WHERE Id = 1", [])
                .unwrap();
        }

        let store = Store::open(&path, &CounterSeeds::default()).unwrap();
        assert!(store.schema_report().is_unchanged());
        assert_eq!(store.next_value(CounterClass::Group).unwrap(), 10_123);
    }

    #[test]
    fn test_read_only_open_never_creates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.sqlite");

        assert!(Store::open_read_only(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_read_only_open_sees_committed_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.sqlite");
        let identity: StableIdentity = "6f9619ff-8b86-d011-b42d-00c04fc964ff".parse().unwrap();

        {
            let mut store = Store::open(&path, &CounterSeeds::default()).unwrap();
            store
                .get_or_create_id(identity, "CN=alice", CounterClass::User)
                .unwrap();
        }

        let reader = Store::open_read_only(&path).unwrap();
        assert_eq!(reader.lookup(&identity).unwrap(), Some(AssignedId::new(10_000)));
        assert_eq!(reader.next_value(CounterClass::User).unwrap(), 10_001);
        assert!(reader.schema_report().is_unchanged());
    }
}

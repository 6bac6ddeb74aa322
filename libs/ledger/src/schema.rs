//! Lazy schema bootstrap.
//!
//! Tables are created only when absent, and the counter row is seeded only in
//! the call that created its table. Running bootstrap again never resets a
//! counter. Ledgers written by the earlier allocator use the same table names
//! and are adopted in place; they only gain the `CounterClass` column.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uidassign_id::AssignedId;

use crate::error::{is_busy, LedgerError};

/// Counter registry table (singleton row).
pub const COUNTER_TABLE: &str = "NextId";

/// Identity-to-ID ledger table.
pub const LEDGER_TABLE: &str = "DirectoryEntry";

/// Ledger column naming the class an ID was drawn from. Absent in ledgers
/// written before classes were tracked.
pub(crate) const CLASS_COLUMN: &str = "CounterClass";

/// Default first ID for every class.
pub const DEFAULT_START: u32 = 10_000;

const CREATE_COUNTER_TABLE: &str = r#"
    CREATE TABLE NextId
    (
        Id INTEGER PRIMARY KEY NOT NULL,
        NextUserId INT NOT NULL,
        NextGroupId INT NOT NULL
    );
"#;

const CREATE_LEDGER_TABLE: &str = r#"
    CREATE TABLE DirectoryEntry
    (
        ObjectGuid BLOB PRIMARY KEY NOT NULL,
        OriginalDistinguishedName TEXT NOT NULL,
        AssignedId INT NOT NULL,
        DateIdAssigned INT NOT NULL,
        CounterClass TEXT
    );
"#;

/// Starting values written into a freshly created counter row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSeeds {
    pub user: AssignedId,
    pub group: AssignedId,
}

impl Default for CounterSeeds {
    fn default() -> Self {
        Self {
            user: AssignedId::new(DEFAULT_START),
            group: AssignedId::new(DEFAULT_START),
        }
    }
}

/// What a bootstrap run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    /// The counter table was created and seeded.
    pub created_counter: bool,
    /// The ledger table was created.
    pub created_ledger: bool,
    /// An existing ledger lacked the `counter_class` column and gained it.
    pub added_class_column: bool,
}

impl SchemaReport {
    /// True when bootstrap found everything already in place.
    pub fn is_unchanged(&self) -> bool {
        !(self.created_counter || self.created_ledger || self.added_class_column)
    }
}

/// Ensure both tables exist, seeding the counter row on creation.
///
/// A store that is already complete is recognised with plain reads, so
/// opening it never waits on another process's write lock.
pub(crate) fn ensure_schema(
    conn: &mut Connection,
    seeds: &CounterSeeds,
) -> Result<SchemaReport, LedgerError> {
    let result = match is_complete(conn) {
        Ok(true) => Ok(SchemaReport::default()),
        Ok(false) => bootstrap(conn, seeds),
        Err(e) => Err(e),
    };
    result.map_err(schema_failure)
}

/// Check that both tables, the class column, and the counter row exist.
pub(crate) fn verify_schema(conn: &Connection) -> Result<(), LedgerError> {
    if is_complete(conn).map_err(schema_failure)? {
        Ok(())
    } else {
        Err(LedgerError::Schema(format!(
            "ledger is not initialized: {COUNTER_TABLE}, {LEDGER_TABLE}.{CLASS_COLUMN} or the counter row is missing"
        )))
    }
}

/// Busy and locked stay as SQLite errors so callers can see the contention.
fn schema_failure(err: LedgerError) -> LedgerError {
    match err {
        LedgerError::Sqlite(e) if !is_busy(&e) => LedgerError::Schema(e.to_string()),
        other => other,
    }
}

fn is_complete(conn: &Connection) -> Result<bool, LedgerError> {
    Ok(table_exists(conn, COUNTER_TABLE)?
        && table_exists(conn, LEDGER_TABLE)?
        && has_column(conn, LEDGER_TABLE, CLASS_COLUMN)?
        && has_counter_row(conn)?)
}

fn has_counter_row(conn: &Connection) -> Result<bool, LedgerError> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM NextId WHERE Id = 1", [], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn bootstrap(conn: &mut Connection, seeds: &CounterSeeds) -> Result<SchemaReport, LedgerError> {
    // Immediate so two processes starting together cannot both seed. Every
    // check is repeated under the lock.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut report = SchemaReport::default();

    if create_table_if_absent(&tx, COUNTER_TABLE, CREATE_COUNTER_TABLE)? {
        tx.execute(
            "INSERT INTO NextId (Id, NextUserId, NextGroupId) VALUES (1, ?1, ?2)",
            params![i64::from(seeds.user), i64::from(seeds.group)],
        )?;
        report.created_counter = true;
        info!(
            user_start = %seeds.user,
            group_start = %seeds.group,
            "Counter registry created"
        );
    }

    if create_table_if_absent(&tx, LEDGER_TABLE, CREATE_LEDGER_TABLE)? {
        report.created_ledger = true;
        info!("Ledger table created");
    } else if !has_column(&tx, LEDGER_TABLE, CLASS_COLUMN)? {
        tx.execute_batch("ALTER TABLE DirectoryEntry ADD COLUMN CounterClass TEXT;")?;
        report.added_class_column = true;
        info!("Ledger table upgraded with CounterClass column");
    }

    if !has_counter_row(&tx)? {
        return Err(LedgerError::Schema(
            "counter table exists but has no registry row".to_string(),
        ));
    }

    tx.commit()?;

    debug!(?report, "Schema bootstrap complete");
    Ok(report)
}

/// Create `name` with `statement` unless a table of that name exists.
///
/// Returns whether the table was created.
fn create_table_if_absent(
    conn: &Connection,
    name: &str,
    statement: &str,
) -> Result<bool, LedgerError> {
    if table_exists(conn, name)? {
        return Ok(false);
    }

    conn.execute_batch(statement)?;
    Ok(true)
}

pub(crate) fn table_exists(conn: &Connection, name: &str) -> Result<bool, LedgerError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, LedgerError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name.eq_ignore_ascii_case(column)))
}

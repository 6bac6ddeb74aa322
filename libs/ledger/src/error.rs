//! Error types for ledger and counter operations.

use rusqlite::ErrorCode;
use thiserror::Error;
use uidassign_id::{CounterClass, StableIdentity};

use crate::allocator::Allocation;

/// Errors from ledger, counter, and bootstrap operations.
///
/// Every variant returned from the allocation path means the transaction was
/// dropped without committing.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A second ledger row was attempted for an identity that already has one.
    #[error("ledger conflict: identity {identity} already has an assigned id")]
    LedgerConflict { identity: StableIdentity },

    /// The counter compare-and-swap did not apply, or another writer holds the store.
    #[error("concurrency/consistency error: {class} counter moved from {expected} under us")]
    CounterRace { class: CounterClass, expected: i64 },

    /// The counter has handed out the last POSIX ID.
    #[error("{class} counter exhausted: no ids left below 2^32")]
    CounterExhausted { class: CounterClass },

    /// Bootstrap could not create or seed the required tables.
    #[error("schema bootstrap failed: {0}")]
    Schema(String),

    /// A stored value is outside the range the ledger ever writes.
    #[error("corrupt ledger state: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl LedgerError {
    /// Get the stable reason code for this error.
    pub fn reason_code(&self) -> &'static str {
        match self {
            LedgerError::LedgerConflict { .. } => "ledger_conflict",
            LedgerError::CounterRace { .. } => "counter_race",
            LedgerError::CounterExhausted { .. } => "counter_exhausted",
            LedgerError::Schema(_) => "schema_error",
            LedgerError::Corrupt(_) => "corrupt_state",
            LedgerError::Sqlite(_) => "sqlite_error",
        }
    }

    /// Returns true if this error means another writer touched the store.
    pub fn is_fatal_contention(&self) -> bool {
        matches!(self, LedgerError::CounterRace { .. })
    }

    /// Returns true if SQLite reported the store busy or locked.
    pub fn is_busy(&self) -> bool {
        matches!(self, LedgerError::Sqlite(err) if is_busy(err))
    }

    /// Reclassifies a busy or locked store as a counter race.
    pub(crate) fn into_contention(self, class: CounterClass, expected: i64) -> Self {
        match self {
            LedgerError::Sqlite(ref err) if is_busy(err) => {
                LedgerError::CounterRace { class, expected }
            }
            other => other,
        }
    }
}

/// A batch that stopped before its last request.
#[derive(Debug, Error)]
#[error("batch stopped at request {} of {total}", .completed.len() + 1)]
pub struct BatchError {
    /// Allocations committed before the failure, in request order.
    pub completed: Vec<Allocation>,
    /// Number of requests in the batch.
    pub total: usize,
    /// Why the failing request was not allocated.
    #[source]
    pub source: LedgerError,
}

pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

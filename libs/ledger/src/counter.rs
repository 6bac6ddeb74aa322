//! Counter registry and the allocate-and-record transaction body.
//!
//! The registry is a single row with one column per class. A counter only
//! moves through [`compare_and_swap`], and only inside the same transaction
//! that records the ledger row receiving the value.

use rusqlite::{params, Connection, Transaction};
use serde::Serialize;
use tracing::{debug, warn};
use uidassign_id::{AssignedId, CounterClass, StableIdentity};

use crate::error::LedgerError;
use crate::ledger::{self, LedgerEntry};

/// Largest raw counter value: one past the last POSIX ID.
const COUNTER_CEILING: i64 = u32::MAX as i64 + 1;

/// Snapshot of the counter registry row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterState {
    /// Next user ID to hand out.
    pub next_user_id: i64,
    /// Next group ID to hand out.
    pub next_group_id: i64,
}

impl CounterState {
    /// Next value for one class.
    pub fn next_for(&self, class: CounterClass) -> i64 {
        match class {
            CounterClass::User => self.next_user_id,
            CounterClass::Group => self.next_group_id,
        }
    }
}

const fn column(class: CounterClass) -> &'static str {
    match class {
        CounterClass::User => "NextUserId",
        CounterClass::Group => "NextGroupId",
    }
}

fn check_range(class: CounterClass, value: i64) -> Result<i64, LedgerError> {
    if (0..=COUNTER_CEILING).contains(&value) {
        Ok(value)
    } else {
        Err(LedgerError::Corrupt(format!(
            "{} = {value} is outside the POSIX ID range",
            column(class)
        )))
    }
}

/// Read the raw next value for `class`.
pub(crate) fn read_next(conn: &Connection, class: CounterClass) -> Result<i64, LedgerError> {
    let value: i64 = conn.query_row(
        &format!("SELECT {} FROM NextId WHERE Id = 1", column(class)),
        [],
        |row| row.get(0),
    )?;
    check_range(class, value)
}

/// Read every counter.
pub(crate) fn read_all(conn: &Connection) -> Result<CounterState, LedgerError> {
    let (user, group): (i64, i64) = conn.query_row(
        "SELECT NextUserId, NextGroupId FROM NextId WHERE Id = 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(CounterState {
        next_user_id: check_range(CounterClass::User, user)?,
        next_group_id: check_range(CounterClass::Group, group)?,
    })
}

/// The ID the next allocation from `class` would receive.
pub(crate) fn candidate(conn: &Connection, class: CounterClass) -> Result<AssignedId, LedgerError> {
    let next = read_next(conn, class)?;
    AssignedId::try_from(next).map_err(|_| LedgerError::CounterExhausted { class })
}

/// Move `class` from `expected` to `future`, only if it still reads `expected`.
pub(crate) fn compare_and_swap(
    conn: &Connection,
    class: CounterClass,
    expected: i64,
    future: i64,
) -> Result<(), LedgerError> {
    let col = column(class);
    let updated = conn
        .execute(
            &format!("UPDATE NextId SET {col} = ?1 WHERE Id = 1 AND {col} = ?2"),
            params![future, expected],
        )
        .map_err(|e| LedgerError::from(e).into_contention(class, expected))?;

    if updated < 1 {
        warn!(%class, expected, "Counter compare-and-swap matched no rows");
        return Err(LedgerError::CounterRace { class, expected });
    }

    Ok(())
}

/// Draw the next ID from `class` and record it for `identity`.
///
/// Runs inside `tx`; nothing is visible until the caller commits, and dropping
/// `tx` on any error undoes the ledger insert.
pub(crate) fn allocate(
    tx: &Transaction<'_>,
    identity: StableIdentity,
    label: &str,
    class: CounterClass,
    assigned_at: i64,
) -> Result<AssignedId, LedgerError> {
    let next = read_next(tx, class)?;
    let assigned_id =
        AssignedId::try_from(next).map_err(|_| LedgerError::CounterExhausted { class })?;

    ledger::record(
        tx,
        &LedgerEntry {
            identity,
            original_label: label.to_string(),
            assigned_id,
            assigned_at,
            class: Some(class),
        },
    )
    .map_err(|e| e.into_contention(class, next))?;

    compare_and_swap(tx, class, next, next + 1)?;

    debug!(%identity, %class, %assigned_id, "Allocation staged");
    Ok(assigned_id)
}

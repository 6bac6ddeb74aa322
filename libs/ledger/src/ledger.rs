//! Write-once identity to ID mapping.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use uidassign_id::{AssignedId, CounterClass, StableIdentity};

use crate::error::{is_constraint_violation, LedgerError};

/// One assignment in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Directory identity, the primary key.
    pub identity: StableIdentity,
    /// Label (distinguished name) at assignment time. Audit only.
    pub original_label: String,
    /// The ID handed out.
    pub assigned_id: AssignedId,
    /// Assignment time, milliseconds since the Unix epoch (UTC).
    pub assigned_at: i64,
    /// Class the ID was drawn from. `None` for rows written before the
    /// ledger tracked it.
    pub class: Option<CounterClass>,
}

/// Column values as stored, before validation.
struct RawEntry {
    object_guid: Vec<u8>,
    original_label: String,
    assigned_id: i64,
    assigned_at: i64,
    class: Option<String>,
}

const SELECT_ENTRY: &str = "SELECT ObjectGuid, OriginalDistinguishedName, AssignedId, DateIdAssigned, CounterClass
     FROM DirectoryEntry";

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            object_guid: row.get(0)?,
            original_label: row.get(1)?,
            assigned_id: row.get(2)?,
            assigned_at: row.get(3)?,
            class: row.get(4)?,
        })
    }

    fn decode(self) -> Result<LedgerEntry, LedgerError> {
        let identity = StableIdentity::from_directory_slice(&self.object_guid)
            .map_err(|e| LedgerError::Corrupt(format!("ledger ObjectGuid: {e}")))?;
        let assigned_id = decode_assigned_id(self.assigned_id)?;
        let class = self
            .class
            .map(|s| CounterClass::parse(&s))
            .transpose()
            .map_err(|e| LedgerError::Corrupt(format!("ledger CounterClass: {e}")))?;

        Ok(LedgerEntry {
            identity,
            original_label: self.original_label,
            assigned_id,
            assigned_at: self.assigned_at,
            class,
        })
    }
}

fn decode_assigned_id(value: i64) -> Result<AssignedId, LedgerError> {
    AssignedId::try_from(value).map_err(|e| LedgerError::Corrupt(format!("ledger AssignedId: {e}")))
}

/// Assigned ID for `identity`, if it has one.
pub(crate) fn lookup(
    conn: &Connection,
    identity: &StableIdentity,
) -> Result<Option<AssignedId>, LedgerError> {
    let key = identity.to_directory_bytes();
    let value: Option<i64> = conn
        .query_row(
            "SELECT AssignedId FROM DirectoryEntry WHERE ObjectGuid = ?1",
            params![&key[..]],
            |row| row.get(0),
        )
        .optional()?;

    value.map(decode_assigned_id).transpose()
}

/// Full ledger row for `identity`, if it has one.
pub(crate) fn entry(
    conn: &Connection,
    identity: &StableIdentity,
) -> Result<Option<LedgerEntry>, LedgerError> {
    let key = identity.to_directory_bytes();
    let raw = conn
        .query_row(
            &format!("{SELECT_ENTRY} WHERE ObjectGuid = ?1"),
            params![&key[..]],
            RawEntry::from_row,
        )
        .optional()?;

    raw.map(RawEntry::decode).transpose()
}

/// Insert a new ledger row. Never overwrites.
pub(crate) fn record(conn: &Connection, entry: &LedgerEntry) -> Result<(), LedgerError> {
    let key = entry.identity.to_directory_bytes();
    conn.execute(
        r#"
        INSERT INTO DirectoryEntry (ObjectGuid, OriginalDistinguishedName, AssignedId, DateIdAssigned, CounterClass)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            &key[..],
            entry.original_label,
            i64::from(entry.assigned_id),
            entry.assigned_at,
            entry.class.map(|c| c.as_str()),
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            LedgerError::LedgerConflict {
                identity: entry.identity,
            }
        } else {
            e.into()
        }
    })?;
    Ok(())
}

/// All ledger rows, optionally limited to one class, ordered by ID.
pub(crate) fn list(
    conn: &Connection,
    class: Option<CounterClass>,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_ENTRY} WHERE (?1 IS NULL OR CounterClass = ?1) ORDER BY AssignedId, ObjectGuid"
    ))?;

    let raws = stmt
        .query_map(params![class.map(|c| c.as_str())], RawEntry::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    raws.into_iter().map(RawEntry::decode).collect()
}

/// Number of ledger rows drawn from `class`.
pub(crate) fn count(conn: &Connection, class: CounterClass) -> Result<u64, LedgerError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM DirectoryEntry WHERE CounterClass = ?1",
        params![class.as_str()],
        |row| row.get(0),
    )?;
    u64::try_from(count).map_err(|_| LedgerError::Corrupt(format!("negative row count {count}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ensure_schema, CounterSeeds};

    fn conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_schema(&mut conn, &CounterSeeds::default()).unwrap();
        conn
    }

    fn sample(guid: &str, label: &str, id: u32) -> LedgerEntry {
        LedgerEntry {
            identity: guid.parse().unwrap(),
            original_label: label.to_string(),
            assigned_id: AssignedId::new(id),
            assigned_at: 1_700_000_000_000,
            class: Some(CounterClass::User),
        }
    }

    #[test]
    fn test_lookup_miss_is_none() {
        let conn = conn();
        let identity: StableIdentity = "6f9619ff-8b86-d011-b42d-00c04fc964ff".parse().unwrap();
        assert!(lookup(&conn, &identity).unwrap().is_none());
        assert!(entry(&conn, &identity).unwrap().is_none());
    }

    #[test]
    fn test_record_then_lookup() {
        let conn = conn();
        let alice = sample("6f9619ff-8b86-d011-b42d-00c04fc964ff", "CN=alice,DC=corp", 10_000);
        record(&conn, &alice).unwrap();

        assert_eq!(
            lookup(&conn, &alice.identity).unwrap(),
            Some(AssignedId::new(10_000))
        );
        assert_eq!(entry(&conn, &alice.identity).unwrap(), Some(alice));
    }

    #[test]
    fn test_record_conflict_leaves_original() {
        let conn = conn();
        let alice = sample("6f9619ff-8b86-d011-b42d-00c04fc964ff", "CN=alice,DC=corp", 10_000);
        record(&conn, &alice).unwrap();

        let imposter = LedgerEntry {
            original_label: "CN=mallory,DC=corp".to_string(),
            assigned_id: AssignedId::new(10_500),
            ..alice.clone()
        };
        let err = record(&conn, &imposter).unwrap_err();
        assert!(matches!(err, LedgerError::LedgerConflict { identity } if identity == alice.identity));

        assert_eq!(entry(&conn, &alice.identity).unwrap(), Some(alice));
    }

    #[test]
    fn test_list_filters_by_class() {
        let conn = conn();
        record(&conn, &sample("00000000-0000-0000-0000-000000000002", "bob", 10_001)).unwrap();
        record(&conn, &sample("00000000-0000-0000-0000-000000000001", "alice", 10_000)).unwrap();
        let group = LedgerEntry {
            class: Some(CounterClass::Group),
            ..sample("00000000-0000-0000-0000-000000000003", "staff", 10_000)
        };
        record(&conn, &group).unwrap();

        let users = list(&conn, Some(CounterClass::User)).unwrap();
        let labels: Vec<_> = users.iter().map(|e| e.original_label.as_str()).collect();
        assert_eq!(labels, vec!["alice", "bob"]);

        assert_eq!(list(&conn, None).unwrap().len(), 3);
        assert_eq!(count(&conn, CounterClass::User).unwrap(), 2);
        assert_eq!(count(&conn, CounterClass::Group).unwrap(), 1);
    }

    #[test]
    fn test_legacy_row_without_class() {
        let conn = conn();
        let identity: StableIdentity = "6f9619ff-8b86-d011-b42d-00c04fc964ff".parse().unwrap();
        let key = identity.to_directory_bytes();
        conn.execute(
            "INSERT INTO DirectoryEntry (ObjectGuid, OriginalDistinguishedName, AssignedId, DateIdAssigned)
             VALUES (?1, 'CN=legacy', 10007, 0)",
            params![&key[..]],
        )
        .unwrap();

        let found = entry(&conn, &identity).unwrap().unwrap();
        assert_eq!(found.class, None);
        assert_eq!(found.assigned_id, AssignedId::new(10_007));
    }

    #[test]
    fn test_corrupt_guid_is_reported() {
        let conn = conn();
        conn.execute(
            "INSERT INTO DirectoryEntry (ObjectGuid, OriginalDistinguishedName, AssignedId, DateIdAssigned)
             VALUES (x'0102', 'CN=short', 1, 0)",
            [],
        )
        .unwrap();

        let err = list(&conn, None).unwrap_err();
        assert!(matches!(err, LedgerError::Corrupt(_)));
    }
}

//! Integration tests for get-or-create allocation.
//!
//! These tests drive the public store API end to end:
//! 1. Fresh stores bootstrap and seed their counters
//! 2. First sightings draw dense, per-class sequences
//! 3. Repeat sightings are answered from the ledger with no writes
//! 4. Committed state survives a reopen
//! 5. Ledgers written by the earlier allocator keep their assignments

use std::collections::BTreeSet;

use proptest::prelude::*;
use rstest::rstest;
use uidassign_id::{AssignedId, CounterClass, StableIdentity, Uuid};
use uidassign_ledger::{
    AllocationOutcome, AllocationRequest, CounterSeeds, LedgerEntry, LedgerError, Store,
};

fn identity(n: u128) -> StableIdentity {
    StableIdentity::from_uuid(Uuid::from_u128(n))
}

fn fresh_store() -> Store {
    Store::open_in_memory(&CounterSeeds::default()).unwrap()
}

#[test]
fn test_alice_bob_group1_scenario() {
    let mut store = fresh_store();
    let id_a = identity(0xa);
    let id_b = identity(0xb);
    let id_c = identity(0xc);

    let alice = store
        .get_or_create_id(id_a, "alice", CounterClass::User)
        .unwrap();
    assert_eq!(alice.assigned_id, AssignedId::new(10_000));
    assert_eq!(alice.outcome, AllocationOutcome::Created);

    let entry = store.entry(&id_a).unwrap().unwrap();
    assert_eq!(entry.assigned_id, AssignedId::new(10_000));
    assert_eq!(entry.original_label, "alice");
    assert!(entry.assigned_at > 0);
    assert_eq!(store.next_value(CounterClass::User).unwrap(), 10_001);

    let again = store
        .get_or_create_id(id_a, "alice", CounterClass::User)
        .unwrap();
    assert_eq!(again.assigned_id, AssignedId::new(10_000));
    assert_eq!(again.outcome, AllocationOutcome::Existing);
    assert_eq!(store.next_value(CounterClass::User).unwrap(), 10_001);

    let bob = store.get_or_create_id(id_b, "bob", CounterClass::User).unwrap();
    assert_eq!(bob.assigned_id, AssignedId::new(10_001));
    assert_eq!(store.next_value(CounterClass::User).unwrap(), 10_002);

    let group1 = store
        .get_or_create_id(id_c, "group1", CounterClass::Group)
        .unwrap();
    assert_eq!(group1.assigned_id, AssignedId::new(10_000));
    assert_eq!(store.next_value(CounterClass::Group).unwrap(), 10_001);
}

#[test]
fn test_repeat_calls_write_nothing() {
    let mut store = fresh_store();
    store
        .get_or_create_id(identity(1), "CN=alice", CounterClass::User)
        .unwrap();

    let entries_before = store.list_entries(None).unwrap();
    let counters_before = store.counters().unwrap();

    for (label, class) in [
        ("CN=alice", CounterClass::User),
        ("CN=alice-renamed", CounterClass::User),
        ("CN=alice", CounterClass::Group),
    ] {
        let again = store.get_or_create_id(identity(1), label, class).unwrap();
        assert_eq!(again.assigned_id, AssignedId::new(10_000));
    }

    assert_eq!(store.list_entries(None).unwrap(), entries_before);
    assert_eq!(store.counters().unwrap(), counters_before);
}

#[rstest]
#[case(CounterClass::User, 1_000)]
#[case(CounterClass::Group, 70_000)]
fn test_seed_is_first_id(#[case] class: CounterClass, #[case] start: u32) {
    let seeds = CounterSeeds {
        user: AssignedId::new(1_000),
        group: AssignedId::new(70_000),
    };
    let mut store = Store::open_in_memory(&seeds).unwrap();

    let first = store.get_or_create_id(identity(1), "CN=first", class).unwrap();
    assert_eq!(first.assigned_id, AssignedId::new(start));
    assert_eq!(store.next_value(class).unwrap(), i64::from(start) + 1);
}

#[test]
fn test_direct_record_conflict() {
    let mut store = fresh_store();
    store
        .get_or_create_id(identity(1), "CN=alice", CounterClass::User)
        .unwrap();
    let original = store.entry(&identity(1)).unwrap().unwrap();

    let duplicate = LedgerEntry {
        identity: identity(1),
        original_label: "CN=duplicate".to_string(),
        assigned_id: AssignedId::new(20_000),
        assigned_at: 0,
        class: Some(CounterClass::User),
    };
    let err = store.record(&duplicate).unwrap_err();
    assert!(matches!(err, LedgerError::LedgerConflict { .. }));
    assert_eq!(err.reason_code(), "ledger_conflict");

    assert_eq!(store.entry(&identity(1)).unwrap().unwrap(), original);
}

#[test]
fn test_assignments_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.sqlite");

    {
        let mut store = Store::open(&path, &CounterSeeds::default()).unwrap();
        store
            .get_or_create_id(identity(1), "CN=alice", CounterClass::User)
            .unwrap();
        store
            .get_or_create_id(identity(2), "CN=staff", CounterClass::Group)
            .unwrap();
    }

    // Different seeds on reopen must not reset anything.
    let seeds = CounterSeeds {
        user: AssignedId::new(1),
        group: AssignedId::new(1),
    };
    let mut store = Store::open(&path, &seeds).unwrap();
    assert!(store.schema_report().is_unchanged());

    let alice = store
        .get_or_create_id(identity(1), "CN=alice", CounterClass::User)
        .unwrap();
    assert_eq!(alice.outcome, AllocationOutcome::Existing);
    assert_eq!(alice.assigned_id, AssignedId::new(10_000));

    let bob = store
        .get_or_create_id(identity(3), "CN=bob", CounterClass::User)
        .unwrap();
    assert_eq!(bob.assigned_id, AssignedId::new(10_001));
}

#[test]
fn test_legacy_tool_ledger_keeps_its_assignments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.sqlite");
    let alice = identity(0xa);

    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE NextId
            (
                Id INTEGER PRIMARY KEY NOT NULL,
                NextUserId INT NOT NULL,
                NextGroupId INT NOT NULL
            );
            CREATE TABLE DirectoryEntry
            (
                ObjectGuid BLOB PRIMARY KEY NOT NULL,
                OriginalDistinguishedName TEXT NOT NULL,
                AssignedId INT NOT NULL,
                DateIdAssigned INT NOT NULL
            );
            INSERT INTO NextId(Id, NextUserId, NextGroupId) VALUES(1, 10005, 10003);
            "#,
        )
        .unwrap();
        conn.execute(
            "INSERT INTO DirectoryEntry(ObjectGuid, OriginalDistinguishedName, AssignedId, DateIdAssigned)
             VALUES(?1, 'CN=alice,DC=corp', 10004, 1500000000000)",
            [&alice.to_directory_bytes()[..]],
        )
        .unwrap();
    }

    let mut store = Store::open(&path, &CounterSeeds::default()).unwrap();
    let report = store.schema_report();
    assert!(!report.created_counter);
    assert!(!report.created_ledger);
    assert!(report.added_class_column);

    let again = store
        .get_or_create_id(alice, "CN=alice,DC=corp", CounterClass::User)
        .unwrap();
    assert_eq!(again.outcome, AllocationOutcome::Existing);
    assert_eq!(again.assigned_id, AssignedId::new(10_004));

    let bob = store
        .get_or_create_id(identity(0xb), "CN=bob,DC=corp", CounterClass::User)
        .unwrap();
    assert_eq!(bob.outcome, AllocationOutcome::Created);
    assert_eq!(bob.assigned_id, AssignedId::new(10_005));

    let staff = store
        .get_or_create_id(identity(0xc), "CN=staff,DC=corp", CounterClass::Group)
        .unwrap();
    assert_eq!(staff.assigned_id, AssignedId::new(10_003));

    let legacy = store.entry(&alice).unwrap().unwrap();
    assert_eq!(legacy.class, None);
    assert_eq!(legacy.assigned_at, 1_500_000_000_000);
    assert_eq!(store.count_entries(CounterClass::User).unwrap(), 1);
    assert_eq!(store.list_entries(None).unwrap().len(), 3);
}

#[test]
fn test_requests_parse_from_json_lines() {
    let input = r#"
{"identity": "6f9619ff-8b86-d011-b42d-00c04fc964ff", "label": "CN=alice,DC=corp", "class": "user"}
{"identity": "{7E57D004-2B97-0E7A-B45F-5387367791CD}", "label": "CN=staff,DC=corp", "class": "GROUP"}
"#;
    let requests: Vec<AllocationRequest> = input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let mut store = fresh_store();
    let done = store.assign_batch(&requests).unwrap();
    assert_eq!(done[0].assigned_id, AssignedId::new(10_000));
    assert_eq!(done[1].assigned_id, AssignedId::new(10_000));
    assert_eq!(store.count_entries(CounterClass::User).unwrap(), 1);
    assert_eq!(store.count_entries(CounterClass::Group).unwrap(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_ids_are_dense_and_unique_per_class(
        picks in prop::collection::vec((0u128..24, any::<bool>()), 1..60),
    ) {
        let mut store = fresh_store();
        let mut class_of = std::collections::HashMap::new();

        for (n, is_user) in &picks {
            let class = if *is_user { CounterClass::User } else { CounterClass::Group };
            let allocation = store
                .get_or_create_id(identity(*n), &format!("CN=obj{n}"), class)
                .unwrap();
            // The first sighting fixes the class for every later call.
            let first_class = *class_of.entry(*n).or_insert(class);
            let entry = store.entry(&identity(*n)).unwrap().unwrap();
            prop_assert_eq!(entry.class, Some(first_class));
            prop_assert_eq!(entry.assigned_id, allocation.assigned_id);
        }

        for class in CounterClass::ALL {
            let ids: Vec<u32> = store
                .list_entries(Some(class))
                .unwrap()
                .iter()
                .map(|e| e.assigned_id.value())
                .collect();
            let unique: BTreeSet<u32> = ids.iter().copied().collect();
            prop_assert_eq!(unique.len(), ids.len());

            let n = ids.len() as u32;
            let expected: BTreeSet<u32> = (10_000..10_000 + n).collect();
            prop_assert_eq!(unique, expected);
            prop_assert_eq!(store.next_value(class).unwrap(), 10_000 + i64::from(n));
        }
    }
}

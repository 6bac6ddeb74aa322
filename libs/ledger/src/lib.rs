//! # uidassign-ledger
//!
//! Durable, idempotent allocation of POSIX user and group IDs for directory
//! objects.
//!
//! This crate provides SQLite-based storage for:
//! - The ledger: one write-once row per identity recording the ID it got
//! - The counter registry: a singleton row holding the next ID per class
//!
//! ## Allocation
//!
//! [`Store::get_or_create_id`] first looks the identity up. A hit returns
//! the recorded ID with no writes. A miss opens a transaction that reads the
//! class counter, inserts the ledger row, and compare-and-swaps the counter;
//! the commit publishes both or neither. A swap that finds the counter moved
//! fails with [`LedgerError::CounterRace`] and is not retried: the store
//! expects a single writer.
//!
//! ```no_run
//! use uidassign_id::{CounterClass, StableIdentity};
//! use uidassign_ledger::{CounterSeeds, Store};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = Store::open("state.sqlite", &CounterSeeds::default())?;
//! let alice: StableIdentity = "6f9619ff-8b86-d011-b42d-00c04fc964ff".parse()?;
//! let allocation = store.get_or_create_id(alice, "CN=alice,DC=corp", CounterClass::User)?;
//! println!("uidNumber = {}", allocation.assigned_id);
//! # Ok(())
//! # }
//! ```

mod allocator;
mod counter;
mod error;
mod ledger;
mod schema;
mod store;

pub use allocator::{Allocation, AllocationOutcome, AllocationRequest};
pub use counter::CounterState;
pub use error::{BatchError, LedgerError};
pub use ledger::LedgerEntry;
pub use schema::{CounterSeeds, SchemaReport, COUNTER_TABLE, DEFAULT_START, LEDGER_TABLE};
pub use store::Store;

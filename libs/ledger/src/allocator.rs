//! Get-or-create allocation.
//!
//! A known identity is answered from the ledger without a transaction. Only
//! a first sighting opens one, and that transaction draws the ID, records it,
//! and bumps the counter as a unit.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uidassign_id::{AssignedId, CounterClass, StableIdentity};

use crate::counter;
use crate::error::{BatchError, LedgerError};
use crate::ledger;
use crate::store::Store;

/// How an allocation was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationOutcome {
    /// The identity already had an ID.
    Existing,
    /// A new ID was drawn and committed.
    Created,
    /// Dry run: the ID a real run would draw next.
    Planned,
}

impl AllocationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Existing => "existing",
            Self::Created => "created",
            Self::Planned => "planned",
        }
    }
}

/// Result of a get-or-create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub identity: StableIdentity,
    pub assigned_id: AssignedId,
    pub outcome: AllocationOutcome,
}

/// One object presented by the directory enumerator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub identity: StableIdentity,
    pub label: String,
    pub class: CounterClass,
}

impl Store {
    /// Return the ID for `identity`, drawing one from `class` on first sight.
    ///
    /// For a known identity `label` and `class` are ignored and nothing is
    /// written. Errors leave the store exactly as it was.
    pub fn get_or_create_id(
        &mut self,
        identity: StableIdentity,
        label: &str,
        class: CounterClass,
    ) -> Result<Allocation, LedgerError> {
        let now = chrono::Utc::now().timestamp_millis();
        self.get_or_create_id_at(identity, label, class, now)
    }

    pub(crate) fn get_or_create_id_at(
        &mut self,
        identity: StableIdentity,
        label: &str,
        class: CounterClass,
        assigned_at: i64,
    ) -> Result<Allocation, LedgerError> {
        if let Some(assigned_id) = ledger::lookup(&self.conn, &identity)? {
            debug!(%identity, %assigned_id, label, "Got existing id");
            return Ok(Allocation {
                identity,
                assigned_id,
                outcome: AllocationOutcome::Existing,
            });
        }

        let tx = self.conn.transaction()?;
        let assigned_id = counter::allocate(&tx, identity, label, class, assigned_at)?;
        tx.commit()
            .map_err(|e| LedgerError::from(e).into_contention(class, i64::from(assigned_id)))?;

        info!(%identity, %class, %assigned_id, label, "Generated id");
        Ok(Allocation {
            identity,
            assigned_id,
            outcome: AllocationOutcome::Created,
        })
    }

    /// Dry run of [`Store::get_or_create_id`]. Writes nothing.
    pub fn peek(
        &self,
        identity: StableIdentity,
        class: CounterClass,
    ) -> Result<Allocation, LedgerError> {
        if let Some(assigned_id) = ledger::lookup(&self.conn, &identity)? {
            return Ok(Allocation {
                identity,
                assigned_id,
                outcome: AllocationOutcome::Existing,
            });
        }

        Ok(Allocation {
            identity,
            assigned_id: counter::candidate(&self.conn, class)?,
            outcome: AllocationOutcome::Planned,
        })
    }

    /// Get-or-create each request in order, stopping at the first error.
    ///
    /// Allocations committed before the failing request stay committed and
    /// are returned in [`BatchError::completed`].
    pub fn assign_batch(
        &mut self,
        requests: &[AllocationRequest],
    ) -> Result<Vec<Allocation>, BatchError> {
        let mut completed = Vec::with_capacity(requests.len());
        for req in requests {
            match self.get_or_create_id(req.identity, &req.label, req.class) {
                Ok(allocation) => completed.push(allocation),
                Err(source) => {
                    return Err(BatchError {
                        completed,
                        total: requests.len(),
                        source,
                    })
                }
            }
        }
        Ok(completed)
    }

    /// What [`Store::assign_batch`] would return, without writing.
    ///
    /// New identities are numbered sequentially per class, and an identity
    /// repeated within the batch keeps the ID planned for its first
    /// occurrence.
    pub fn plan_batch(&self, requests: &[AllocationRequest]) -> Result<Vec<Allocation>, LedgerError> {
        let mut offsets: BTreeMap<CounterClass, i64> = BTreeMap::new();
        let mut planned: HashMap<StableIdentity, AssignedId> = HashMap::new();
        let mut plan = Vec::with_capacity(requests.len());

        for req in requests {
            if let Some(assigned_id) = ledger::lookup(&self.conn, &req.identity)? {
                plan.push(Allocation {
                    identity: req.identity,
                    assigned_id,
                    outcome: AllocationOutcome::Existing,
                });
                continue;
            }

            if let Some(&assigned_id) = planned.get(&req.identity) {
                plan.push(Allocation {
                    identity: req.identity,
                    assigned_id,
                    outcome: AllocationOutcome::Planned,
                });
                continue;
            }

            let offset = offsets.entry(req.class).or_insert(0);
            let next = counter::read_next(&self.conn, req.class)? + *offset;
            let assigned_id = AssignedId::try_from(next)
                .map_err(|_| LedgerError::CounterExhausted { class: req.class })?;
            *offset += 1;

            planned.insert(req.identity, assigned_id);
            plan.push(Allocation {
                identity: req.identity,
                assigned_id,
                outcome: AllocationOutcome::Planned,
            });
        }

        Ok(plan)
    }
}

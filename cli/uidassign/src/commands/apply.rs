//! Batch assignment from the directory enumerator's output.
//!
//! Input is JSON Lines, one object per line:
//!
//! ```text
//! {"identity": "6f9619ff-8b86-d011-b42d-00c04fc964ff", "label": "CN=alice,OU=People,DC=corp", "class": "user"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tracing::info;
use uidassign_ledger::{Allocation, AllocationRequest};

use crate::error::CliError;
use crate::output::{print_info, print_output, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Request file; reads stdin when omitted or `-`.
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Print the ids that would be assigned without writing.
    #[arg(long)]
    dry_run: bool,
}

/// One processed request.
#[derive(Debug, Serialize, Tabled)]
struct AllocationRow {
    #[tabled(rename = "Identity")]
    identity: String,

    #[tabled(rename = "Attribute")]
    attribute: &'static str,

    #[tabled(rename = "ID")]
    assigned_id: u32,

    #[tabled(rename = "Outcome")]
    outcome: &'static str,

    #[tabled(rename = "Label")]
    label: String,
}

impl AllocationRow {
    fn new(request: &AllocationRequest, allocation: &Allocation) -> Self {
        Self {
            identity: allocation.identity.to_string(),
            attribute: request.class.directory_attribute(),
            assigned_id: allocation.assigned_id.value(),
            outcome: allocation.outcome.as_str(),
            label: request.label.clone(),
        }
    }
}

/// Assign ids to every object in the input.
pub fn apply(ctx: CommandContext, args: ApplyArgs) -> Result<()> {
    let requests = match args.input.as_deref() {
        Some(path) if path.as_os_str() != "-" => {
            let file =
                File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
            parse_requests(BufReader::new(file))?
        }
        _ => parse_requests(io::stdin().lock())?,
    };

    if args.dry_run {
        let store = ctx.open_store_read_only()?;
        let plan = store.plan_batch(&requests)?;
        print_output(&rows_for(&requests, &plan), ctx.format);
        return Ok(());
    }

    let mut store = ctx.open_store()?;

    let allocations = match store.assign_batch(&requests) {
        Ok(allocations) => allocations,
        Err(err) => {
            print_output(&rows_for(&requests, &err.completed), ctx.format);
            let failed = &requests[err.completed.len()];
            let context = format!(
                "Stopped at {} ({}) after {} of {} objects",
                failed.identity,
                failed.label,
                err.completed.len(),
                err.total
            );
            return Err(anyhow::Error::new(err).context(context));
        }
    };

    let rows = rows_for(&requests, &allocations);
    let created = rows.iter().filter(|r| r.outcome == "created").count();
    info!(total = rows.len(), created, "Batch applied");

    print_output(&rows, ctx.format);
    if ctx.format == OutputFormat::Table {
        print_info(&format!(
            "{} objects, {} new ids, {} already assigned",
            rows.len(),
            created,
            rows.len() - created
        ));
    }
    Ok(())
}

/// Pair each allocation with the request that produced it.
fn rows_for(requests: &[AllocationRequest], allocations: &[Allocation]) -> Vec<AllocationRow> {
    requests
        .iter()
        .zip(allocations)
        .map(|(req, allocation)| AllocationRow::new(req, allocation))
        .collect()
}

/// Parse JSON Lines requests.
fn parse_requests<R: BufRead>(reader: R) -> Result<Vec<AllocationRequest>> {
    let mut requests = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read request input")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let request: AllocationRequest =
            serde_json::from_str(trimmed).map_err(|e| CliError::InvalidRequest {
                line: index + 1,
                message: e.to_string(),
            })?;
        requests.push(request);
    }

    Ok(requests)
}

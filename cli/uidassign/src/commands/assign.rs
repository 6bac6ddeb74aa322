//! Single-object assignment commands.

use anyhow::Result;
use clap::Args;
use uidassign_id::{CounterClass, StableIdentity};
use uidassign_ledger::{Allocation, AllocationOutcome};

use crate::output::{print_info, print_json, print_success, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct AssignArgs {
    /// Object GUID.
    identity: StableIdentity,

    /// Label recorded with a new assignment (usually the distinguished name).
    #[arg(long)]
    label: String,

    /// Counter to draw from (user or group).
    #[arg(long)]
    class: CounterClass,
}

#[derive(Debug, Args)]
pub struct PeekArgs {
    /// Object GUID.
    identity: StableIdentity,

    /// Counter a new assignment would draw from (user or group).
    #[arg(long)]
    class: CounterClass,
}

/// Get or create the id for one object.
pub fn assign(ctx: CommandContext, args: AssignArgs) -> Result<()> {
    let mut store = ctx.open_store()?;
    let allocation = store.get_or_create_id(args.identity, &args.label, args.class)?;

    report(ctx.format, &allocation, &args.label);
    Ok(())
}

/// Show what `assign` would do.
pub fn peek(ctx: CommandContext, args: PeekArgs) -> Result<()> {
    let store = ctx.open_store_read_only()?;
    let allocation = store.peek(args.identity, args.class)?;

    report(ctx.format, &allocation, "");
    Ok(())
}

fn report(format: OutputFormat, allocation: &Allocation, label: &str) {
    if format == OutputFormat::Json {
        print_json(allocation);
        return;
    }

    let subject = if label.is_empty() {
        allocation.identity.to_string()
    } else {
        format!("{} ({})", allocation.identity, label)
    };

    match allocation.outcome {
        AllocationOutcome::Created => print_success(&format!(
            "Generated id {} for {}",
            allocation.assigned_id, subject
        )),
        AllocationOutcome::Existing => print_info(&format!(
            "Got existing id {} for {}",
            allocation.assigned_id, subject
        )),
        AllocationOutcome::Planned => print_info(&format!(
            "Would generate id {} for {}",
            allocation.assigned_id, subject
        )),
    }
}

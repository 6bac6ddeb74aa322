//! Read-only ledger commands, plus `init`.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use uidassign_id::{CounterClass, StableIdentity};
use uidassign_ledger::{LedgerEntry, Store, COUNTER_TABLE, LEDGER_TABLE};

use crate::error::CliError;
use crate::output::{
    format_millis, print_info, print_json, print_output, print_success, OutputFormat,
};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Object GUID.
    identity: StableIdentity,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only entries drawn from this counter (user or group).
    #[arg(long)]
    class: Option<CounterClass>,
}

/// Ledger entry as displayed.
#[derive(Debug, Serialize, Tabled)]
struct EntryRow {
    #[tabled(rename = "Identity")]
    identity: String,

    #[tabled(rename = "ID")]
    assigned_id: u32,

    #[tabled(rename = "Class")]
    class: String,

    #[tabled(rename = "Assigned")]
    assigned_at: String,

    #[tabled(rename = "Original label")]
    original_label: String,
}

impl From<&LedgerEntry> for EntryRow {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            identity: entry.identity.to_string(),
            assigned_id: entry.assigned_id.value(),
            class: entry
                .class
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            assigned_at: format_millis(entry.assigned_at),
            original_label: entry.original_label.clone(),
        }
    }
}

/// Counter as displayed.
#[derive(Debug, Serialize, Tabled)]
struct CounterRow {
    #[tabled(rename = "Class")]
    class: &'static str,

    #[tabled(rename = "Attribute")]
    attribute: &'static str,

    #[tabled(rename = "Next ID")]
    next_id: i64,

    #[tabled(rename = "Assigned")]
    assigned: u64,
}

fn counter_rows(store: &Store) -> Result<Vec<CounterRow>> {
    let state = store.counters()?;
    CounterClass::ALL
        .into_iter()
        .map(|class| {
            Ok(CounterRow {
                class: class.as_str(),
                attribute: class.directory_attribute(),
                next_id: state.next_for(class),
                assigned: store.count_entries(class)?,
            })
        })
        .collect()
}

/// Create missing tables and show the counters.
pub fn init(ctx: CommandContext) -> Result<()> {
    let store = ctx.open_store()?;
    let report = store.schema_report();

    if ctx.format == OutputFormat::Json {
        print_json(&serde_json::json!({
            "db_path": ctx.config.db_path,
            "schema": report,
            "counters": counter_rows(&store)?,
        }));
        return Ok(());
    }

    if report.is_unchanged() {
        print_info(&format!("Ledger {:?} already initialized", ctx.config.db_path));
    } else {
        let mut created = Vec::new();
        if report.created_counter {
            created.push(COUNTER_TABLE);
        }
        if report.created_ledger {
            created.push(LEDGER_TABLE);
        }
        if !created.is_empty() {
            print_success(&format!("Created tables: {}", created.join(", ")));
        }
        if report.added_class_column {
            print_success(&format!("Added CounterClass column to {LEDGER_TABLE}"));
        }
    }

    print_output(&counter_rows(&store)?, ctx.format);
    Ok(())
}

/// Show one ledger entry.
pub fn lookup(ctx: CommandContext, args: LookupArgs) -> Result<()> {
    let store = ctx.open_store_read_only()?;
    let entry = store
        .entry(&args.identity)?
        .ok_or_else(|| CliError::NotFound(args.identity.to_string()))?;

    match ctx.format {
        OutputFormat::Json => print_json(&entry),
        OutputFormat::Table => print_output(&[EntryRow::from(&entry)], ctx.format),
    }
    Ok(())
}

/// List ledger entries.
pub fn list(ctx: CommandContext, args: ListArgs) -> Result<()> {
    let store = ctx.open_store_read_only()?;
    let entries = store.list_entries(args.class)?;

    match ctx.format {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Table => {
            let rows: Vec<EntryRow> = entries.iter().map(EntryRow::from).collect();
            print_output(&rows, ctx.format);
        }
    }
    Ok(())
}

/// Show the counter registry.
pub fn counters(ctx: CommandContext) -> Result<()> {
    let store = ctx.open_store_read_only()?;
    print_output(&counter_rows(&store)?, ctx.format);
    Ok(())
}

//! Error handling and display for the CLI.

use std::path::PathBuf;

use colored::Colorize;
use thiserror::Error;
use uidassign_ledger::LedgerError;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("No ledger entry for {0}")]
    NotFound(String),

    #[error("No ledger at {0:?}")]
    NoLedger(PathBuf),

    #[error("Invalid request on line {line}: {message}")]
    InvalidRequest { line: usize, message: String },
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    if let Some(ledger_err) = err.chain().find_map(|e| e.downcast_ref::<LedgerError>()) {
        if let Some(hint) = ledger_hint(ledger_err) {
            eprintln!("\n{}", hint.yellow());
        }
        return;
    }

    match err.downcast_ref::<CliError>() {
        Some(CliError::InvalidRequest { .. }) => eprintln!(
            "\n{}",
            r#"Hint: each line must look like {"identity": "<guid>", "label": "<dn>", "class": "user"}"#
                .yellow()
        ),
        Some(CliError::NoLedger(_)) => eprintln!(
            "\n{}",
            "Hint: run `uidassign init` or pass --db to point at an existing ledger.".yellow()
        ),
        _ => {}
    }
}

fn ledger_hint(err: &LedgerError) -> Option<&'static str> {
    match err {
        LedgerError::CounterRace { .. } => Some(
            "Hint: another allocator is writing to this ledger. Only one may run at a time; \
             rerun once it has finished. Nothing from the failed allocation was saved.",
        ),
        LedgerError::LedgerConflict { .. } => {
            Some("Hint: this identity already has an id. Use `uidassign lookup` to see it.")
        }
        LedgerError::Schema(_) => Some(
            "Hint: run `uidassign init` to create or upgrade the ledger, and check that the \
             path is writable and is a SQLite database.",
        ),
        LedgerError::CounterExhausted { .. } => {
            Some("Hint: the counter passed the largest POSIX id; no more ids can be assigned.")
        }
        LedgerError::Sqlite(_) if err.is_busy() => {
            Some("Hint: another process holds the ledger lock; rerun once it has finished.")
        }
        LedgerError::Corrupt(_) | LedgerError::Sqlite(_) => None,
    }
}

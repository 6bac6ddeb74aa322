//! CLI commands.

mod apply;
mod assign;
mod inspect;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use uidassign_ledger::Store;

use crate::config::{Config, Overrides};
use crate::error::CliError;
use crate::output::OutputFormat;

/// uidassign - stable uidNumber/gidNumber assignment for directory objects.
#[derive(Debug, Parser)]
#[command(name = "uidassign")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Path of the SQLite ledger.
    #[arg(long, global = true, env = "UIDASSIGN_DB")]
    db: Option<PathBuf>,

    /// Config file (defaults to config.json in the user config directory).
    #[arg(long, global = true, env = "UIDASSIGN_CONFIG")]
    config: Option<PathBuf>,

    /// First uidNumber, used only when the ledger is created.
    #[arg(long, global = true, env = "UIDASSIGN_USER_START")]
    user_start: Option<u32>,

    /// First gidNumber, used only when the ledger is created.
    #[arg(long, global = true, env = "UIDASSIGN_GROUP_START")]
    group_start: Option<u32>,

    /// Emit logs as JSON on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the ledger tables if they are missing.
    Init,

    /// Get or create the id for one object.
    Assign(assign::AssignArgs),

    /// Show the id an object has, or would get, without writing.
    Peek(assign::PeekArgs),

    /// Get or create ids for a batch of objects read as JSON Lines.
    Apply(apply::ApplyArgs),

    /// Show the ledger entry for one object.
    Lookup(inspect::LookupArgs),

    /// List ledger entries.
    List(inspect::ListArgs),

    /// Show the next id of every counter.
    Counters,
}

impl Cli {
    pub fn log_json(&self) -> bool {
        self.log_json
    }

    /// Run the CLI command.
    pub fn run(self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?.with_overrides(Overrides {
            db_path: self.db,
            user_start: self.user_start,
            group_start: self.group_start,
        });
        debug!(?config, "Configuration loaded");

        let ctx = CommandContext {
            config,
            format: self.format,
        };

        match self.command {
            Commands::Init => inspect::init(ctx),
            Commands::Assign(args) => assign::assign(ctx, args),
            Commands::Peek(args) => assign::peek(ctx, args),
            Commands::Apply(args) => apply::apply(ctx, args),
            Commands::Lookup(args) => inspect::lookup(ctx, args),
            Commands::List(args) => inspect::list(ctx, args),
            Commands::Counters => inspect::counters(ctx),
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Open the ledger, creating and seeding it on first use.
    pub fn open_store(&self) -> Result<Store> {
        Store::open(&self.config.db_path, &self.config.seeds())
            .with_context(|| format!("Failed to open ledger {:?}", self.config.db_path))
    }

    /// Open an existing ledger without creating or upgrading anything.
    pub fn open_store_read_only(&self) -> Result<Store> {
        if !self.config.db_path.exists() {
            return Err(CliError::NoLedger(self.config.db_path.clone()).into());
        }
        Store::open_read_only(&self.config.db_path)
            .with_context(|| format!("Failed to open ledger {:?}", self.config.db_path))
    }
}

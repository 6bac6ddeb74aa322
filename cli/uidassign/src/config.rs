//! Configuration loading.
//!
//! Values are layered, last one wins:
//! - Built-in defaults (`state.sqlite`, both counters starting at 10000)
//! - `config.json` in the platform config directory, or `--config`
//! - Environment variables and command-line flags

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use uidassign_id::AssignedId;
use uidassign_ledger::{CounterSeeds, DEFAULT_START};

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Get the default config file path.
fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "uidassign", "uidassign")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the SQLite ledger.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// First uidNumber handed out by a new ledger.
    #[serde(default = "default_start")]
    pub user_start: u32,

    /// First gidNumber handed out by a new ledger.
    #[serde(default = "default_start")]
    pub group_start: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("state.sqlite")
}

fn default_start() -> u32 {
    DEFAULT_START
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            user_start: default_start(),
            group_start: default_start(),
        }
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_path: Option<PathBuf>,
    pub user_start: Option<u32>,
    pub group_start: Option<u32>,
}

impl Config {
    /// Load config from `explicit` if given, else from the default location.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_from(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Load config from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Apply flag and environment overrides.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(db_path) = overrides.db_path {
            self.db_path = db_path;
        }
        if let Some(start) = overrides.user_start {
            self.user_start = start;
        }
        if let Some(start) = overrides.group_start {
            self.group_start = start;
        }
        self
    }

    /// Counter seeds for a freshly created ledger.
    pub fn seeds(&self) -> CounterSeeds {
        CounterSeeds {
            user: AssignedId::new(self.user_start),
            group: AssignedId::new(self.group_start),
        }
    }
}

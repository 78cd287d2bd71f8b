//! Run-state bookkeeping.
//!
//! The state records when the last successful run finished, its run id and a
//! fingerprint of each warehouse table. It is informational only: every run
//! is a full rebuild. The pipeline takes a `RunState` and hands back the next
//! one; only the binary reads and writes the file.

mod hash;
pub use hash::content_hash;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::warehouse::Warehouse;

/// Errors that can occur reading or writing the state file.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to access state file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file '{}' is not valid: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type StateResult<T> = Result<T, StateError>;

/// Fingerprint of one loaded table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableState {
    pub rows: usize,
    pub sha256: String,
}

/// What the last successful run left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub last_run: Option<NaiveDateTime>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub tables: BTreeMap<String, TableState>,
}

impl RunState {
    /// Read the state file. A missing file means a first run.
    pub fn load(path: &Path) -> StateResult<Self> {
        if !path.exists() {
            info!("No previous state found (first run)");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let state = serde_json::from_str(&text).map_err(|source| StateError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded state from {}", path.display());
        Ok(state)
    }

    /// Write the state file as pretty JSON, creating its directory.
    pub fn save(&self, path: &Path) -> StateResult<()> {
        let io_err = |source: std::io::Error| StateError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| StateError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(io_err)?;
        info!(
            "Updated state file with timestamp: {}",
            self.last_run
                .map(|t| t.to_string())
                .unwrap_or_else(|| "never".to_string())
        );
        Ok(())
    }

    pub fn is_first_run(&self) -> bool {
        self.last_run.is_none()
    }

    /// The state after a successful run that produced `warehouse`.
    pub fn advanced(&self, run_id: &str, finished: NaiveDateTime, warehouse: &Warehouse) -> Self {
        let tables = warehouse
            .iter()
            .map(|(which, table)| {
                (
                    which.name().to_string(),
                    TableState {
                        rows: table.len(),
                        sha256: content_hash(table),
                    },
                )
            })
            .collect();
        Self {
            last_run: Some(finished),
            run_id: Some(run_id.to_string()),
            tables,
        }
    }

    /// Tables whose fingerprint differs from `previous` (or that are new).
    pub fn changed_since<'a>(&'a self, previous: &'a RunState) -> impl Iterator<Item = &'a str> {
        self.tables
            .iter()
            .filter(move |(name, now)| previous.tables.get(*name) != Some(*now))
            .map(|(name, _)| name.as_str())
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.last_run, &self.run_id) {
            (Some(at), Some(id)) => writeln!(f, "Last run: {} ({})", at, id)?,
            (Some(at), None) => writeln!(f, "Last run: {}", at)?,
            _ => return write!(f, "No previous run"),
        }
        for (name, table) in &self.tables {
            let short = table.sha256.get(..12).unwrap_or(&table.sha256);
            writeln!(f, "  {:<18} {:>8} rows  {}", name, table.rows, short)?;
        }
        Ok(())
    }
}

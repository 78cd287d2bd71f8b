//! Load stage: persist the warehouse to CSV files and the SQLite store.
//!
//! The two sinks are independent. A table that fails in one sink is still
//! attempted in the other, and one failing table never stops the rest.

mod store;

pub use store::{save_to_store, StoreError, StoreResult, WarehouseStore};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, info_span};

use crate::config::Settings;
use crate::config::SettingsError;
use crate::diagnostics::Diagnostics;
use crate::extract::{extract_table, ExtractError};
use crate::model::Table;
use crate::pipeline::Stage;
use crate::warehouse::{Warehouse, WarehouseTable};

/// Errors raised while writing or reading warehouse output.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot create output directory '{}': {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {table}: {source}")]
    Csv {
        table: String,
        #[source]
        source: csv::Error,
    },

    #[error("failed to inspect '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{table}: file '{}' missing or empty after write", path.display())]
    NotWritten { table: String, path: PathBuf },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

pub type LoadResult<T> = Result<T, LoadError>;

/// A CSV file written for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

/// Outcome of one sink across all tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SinkSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl SinkSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-sink outcome of the load stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub files: SinkSummary,
    pub store: SinkSummary,
    pub bytes_written: u64,
}

impl LoadSummary {
    /// No table failed in either sink.
    pub fn all_succeeded(&self) -> bool {
        self.files.all_succeeded() && self.store.all_succeeded()
    }

    pub fn failed_tables(&self) -> impl Iterator<Item = &str> {
        self.files
            .failed
            .iter()
            .chain(self.store.failed.iter())
            .map(String::as_str)
    }
}

/// Write `table` to `<dir>/<name>.csv`, header included, and confirm the
/// file landed.
pub fn save_to_file(table: &Table, dir: &Path) -> LoadResult<FileWrite> {
    let path = dir.join(format!("{}.csv", table.name));
    let csv_err = |source| LoadError::Csv {
        table: table.name.clone(),
        source,
    };

    let mut writer = csv::Writer::from_path(&path).map_err(csv_err)?;
    writer.write_record(table.column_names()).map_err(csv_err)?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|v| v.to_field()))
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|source| LoadError::Io {
        path: path.clone(),
        source,
    })?;
    drop(writer);

    if !path.exists() {
        return Err(LoadError::NotWritten {
            table: table.name.clone(),
            path,
        });
    }
    let bytes = fs::metadata(&path)
        .map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?
        .len();
    if bytes == 0 && !table.is_empty() {
        return Err(LoadError::NotWritten {
            table: table.name.clone(),
            path,
        });
    }

    Ok(FileWrite {
        path,
        rows: table.len(),
        bytes,
    })
}

/// Write every warehouse table to both sinks.
///
/// Only an unusable output directory is fatal; per-table failures are
/// recorded in the summary and as diagnostics.
pub fn load_warehouse(
    warehouse: &Warehouse,
    settings: &Settings,
    diags: &mut Diagnostics,
) -> LoadResult<LoadSummary> {
    let out_dir = settings.paths.processed_dir()?;
    let db_path = settings.paths.database()?;

    fs::create_dir_all(&out_dir).map_err(|source| LoadError::OutputDir {
        path: out_dir.clone(),
        source,
    })?;

    let mut summary = LoadSummary::default();
    for (which, table) in warehouse.iter() {
        let _span = info_span!("load", table = which.name()).entered();

        match save_to_file(table, &out_dir) {
            Ok(written) => {
                if written.rows == 0 {
                    diags.warn(Stage::Load, which.name(), "wrote an empty table", 1);
                }
                info!(
                    "  {} -> {} ({} rows, {} bytes)",
                    which,
                    written.path.display(),
                    written.rows,
                    written.bytes
                );
                summary.bytes_written += written.bytes;
                summary.files.succeeded.push(which.name().to_string());
            }
            Err(e) => {
                error!("  {}: CSV write failed: {}", which, e);
                diags.error(Stage::Load, which.name(), format!("CSV write failed: {}", e), 1);
                summary.files.failed.push(which.name().to_string());
            }
        }

        match save_to_store(table, &db_path) {
            Ok(rows) => {
                info!("  {} -> {} ({} rows)", which, db_path.display(), rows);
                summary.store.succeeded.push(which.name().to_string());
            }
            Err(e) => {
                error!("  {}: database write failed: {}", which, e);
                diags.error(
                    Stage::Load,
                    which.name(),
                    format!("database write failed: {}", e),
                    1,
                );
                summary.store.failed.push(which.name().to_string());
            }
        }
    }

    info!("Load summary:");
    info!(
        "  CSV: {} succeeded, {} failed",
        summary.files.succeeded.len(),
        summary.files.failed.len()
    );
    info!(
        "  Database: {} succeeded, {} failed",
        summary.store.succeeded.len(),
        summary.store.failed.len()
    );
    Ok(summary)
}

/// Read the six processed CSVs back into a warehouse.
///
/// A missing file becomes an empty table; every column reads back as text.
pub fn read_processed(dir: &Path) -> LoadResult<Warehouse> {
    let mut warehouse = Warehouse::new();
    for which in WarehouseTable::ALL {
        let path = dir.join(format!("{}.csv", which.name()));
        let extracted = extract_table(&path, which.name())?;
        warehouse.insert(which, extracted.table);
    }
    Ok(warehouse)
}

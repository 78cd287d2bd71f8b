//! Extract stage: read the raw CSV sources into tables.
//!
//! A missing file is not an error. It yields an empty table marked
//! `missing` and a warning. A file that exists but cannot be parsed is fatal
//! for that source.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, info_span, warn};

use crate::diagnostics::Diagnostics;
use crate::model::{Column, DataType, Source, Table, Value};
use crate::pipeline::Stage;

/// Errors that can occur while reading a source file.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to open {table} source '{}': {source}", path.display())]
    Open {
        table: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV parsing error in {table}: {source}")]
    Parse {
        table: String,
        #[source]
        source: csv::Error,
    },

    #[error("{table} line {line}: expected {expected} fields, saw {found}")]
    TooManyFields {
        table: String,
        line: u64,
        expected: usize,
        found: usize,
    },
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// One extracted source.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub table: Table,
    /// The source file did not exist.
    pub missing: bool,
}

/// The six extracted sources keyed by source.
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    tables: BTreeMap<Source, Extracted>,
}

impl RawTables {
    pub fn insert(&mut self, source: Source, extracted: Extracted) {
        self.tables.insert(source, extracted);
    }

    pub fn get(&self, source: Source) -> Option<&Extracted> {
        self.tables.get(&source)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Source, &Extracted)> {
        self.tables.iter()
    }
}

/// Read a CSV file into an all-text table.
///
/// Every header becomes a `Text` column; empty and NA-like cells become `Null`.
/// Rows shorter than the header are padded with `Null`; longer rows are fatal.
pub fn read_csv(path: &Path, name: &str) -> ExtractResult<Table> {
    let file = File::open(path).map_err(|source| ExtractError::Open {
        table: name.to_string(),
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |source| ExtractError::Parse {
        table: name.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(file);

    let columns: Vec<Column> = reader
        .headers()
        .map_err(parse_err)?
        .iter()
        .map(|h| Column::new(h, DataType::Text))
        .collect();
    let width = columns.len();
    let mut table = Table::new(name, columns);

    for record in reader.records() {
        let record = record.map_err(parse_err)?;
        if record.len() > width {
            return Err(ExtractError::TooManyFields {
                table: name.to_string(),
                line: record.position().map_or(0, |p| p.line()),
                expected: width,
                found: record.len(),
            });
        }
        table.push_row(record.iter().map(Value::from_raw).collect());
    }

    Ok(table)
}

/// Read one source, tolerating a missing file.
pub fn extract_table(path: &Path, name: &str) -> ExtractResult<Extracted> {
    if !path.exists() {
        warn!(table = name, path = %path.display(), "File not found");
        return Ok(Extracted {
            table: Table::empty(name),
            missing: true,
        });
    }

    let table = read_csv(path, name)?;
    debug!(table = name, path = %path.display(), "Loaded source");
    Ok(Extracted {
        table,
        missing: false,
    })
}

/// Read all six sources from `raw_dir` in processing order.
pub fn extract_all(raw_dir: &Path, diags: &mut Diagnostics) -> ExtractResult<RawTables> {
    let mut raw = RawTables::default();

    for source in Source::ALL {
        let _span = info_span!("extract", table = source.name()).entered();
        let path = raw_dir.join(source.file_name());
        let extracted = extract_table(&path, source.name())?;
        if extracted.missing {
            diags.warn(
                Stage::Extract,
                source.name(),
                format!("source file not found: {}", path.display()),
                1,
            );
        }
        info!("Loaded {} {}", extracted.table.len(), source.name());
        raw.insert(source, extracted);
    }

    info!("Extract summary:");
    for (source, extracted) in raw.iter() {
        let table = &extracted.table;
        let nulls = table.total_nulls();
        if nulls > 0 {
            warn!(
                "  {}: {} rows x {} cols | {} NULL values found",
                source,
                table.len(),
                table.columns.len(),
                nulls
            );
        } else {
            debug!("  {}: {} rows x {} cols", source, table.len(), table.columns.len());
        }
    }

    Ok(raw)
}

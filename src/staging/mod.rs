//! Staging stage: clean and standardize the raw tables.
//!
//! Every source is staged by the same routine driven by its declared
//! [`SourceSchema`]:
//!
//! 1. required columns must be present (fatal otherwise)
//! 2. rows with a null primary key are removed
//! 3. duplicate primary keys are removed, first occurrence kept
//! 4. declared columns are coerced to their type; unparseable values become null
//! 5. text is normalized; numeric domains are checked and, for ratings, clamped
//!
//! Only step 1 can fail. Everything else is counted and reported.

mod coerce;

pub use coerce::{coerce, normalize_text, title_case, Coerced};

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, info_span};

use crate::diagnostics::Diagnostics;
use crate::extract::RawTables;
use crate::model::{Column, DataType, Source, SourceSchema, Table, Value};
use crate::pipeline::Stage;

/// Errors that abort the staging stage.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("{table}: required column '{column}' is missing")]
    MissingColumn { table: String, column: String },

    #[error("{table}: no source table was extracted")]
    MissingSource { table: String },
}

pub type StagingResult<T> = Result<T, StagingError>;

static NULL: Value = Value::Null;

/// Row and value counts for one staged table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageStats {
    pub input_rows: usize,
    pub null_keys: usize,
    pub duplicates: usize,
    /// Per column: non-null values that failed to parse.
    pub invalid: BTreeMap<String, usize>,
    /// Per column: values outside the declared domain.
    pub out_of_domain: BTreeMap<String, usize>,
    /// Per column: values clamped into the domain.
    pub clamped: BTreeMap<String, usize>,
    pub output_rows: usize,
}

impl StageStats {
    pub fn invalid_in(&self, column: &str) -> usize {
        self.invalid.get(column).copied().unwrap_or(0)
    }

    pub fn out_of_domain_in(&self, column: &str) -> usize {
        self.out_of_domain.get(column).copied().unwrap_or(0)
    }

    pub fn clamped_in(&self, column: &str) -> usize {
        self.clamped.get(column).copied().unwrap_or(0)
    }
}

/// A staged table together with what staging did to it.
#[derive(Debug, Clone)]
pub struct Staged {
    pub table: Table,
    pub stats: StageStats,
    pub diagnostics: Diagnostics,
}

/// Stage a raw table against its schema.
///
/// A table with neither columns nor rows stands for a missing source file and
/// stages to an empty table with the declared columns.
pub fn stage_table(raw: &Table, schema: &SourceSchema) -> StagingResult<Staged> {
    let name = schema.source.name();
    let mut diagnostics = Diagnostics::new();
    let mut stats = StageStats {
        input_rows: raw.len(),
        ..StageStats::default()
    };

    if raw.columns.is_empty() && raw.is_empty() {
        let columns = schema
            .columns
            .iter()
            .map(|spec| Column::new(spec.name.clone(), spec.data_type))
            .collect();
        diagnostics.warn(Stage::Stage, name, "no source rows, staged as empty table", 1);
        return Ok(Staged {
            table: Table::new(name, columns),
            stats,
            diagnostics,
        });
    }

    if let Some(column) = schema.required_columns().find(|c| !raw.has_column(c)) {
        return Err(StagingError::MissingColumn {
            table: name.to_string(),
            column: column.to_string(),
        });
    }

    // Output layout: raw columns in order (typed if declared), then declared
    // optional columns the file did not carry.
    let mut columns: Vec<Column> = raw
        .columns
        .iter()
        .map(|c| {
            let data_type = schema
                .column(&c.name)
                .map(|spec| spec.data_type)
                .unwrap_or(DataType::Text);
            Column::new(c.name.clone(), data_type)
        })
        .collect();
    for spec in &schema.columns {
        if !raw.has_column(&spec.name) {
            columns.push(Column::new(spec.name.clone(), spec.data_type));
        }
    }
    let specs: Vec<_> = columns.iter().map(|c| schema.column(&c.name)).collect();
    let sources: Vec<Option<usize>> = columns.iter().map(|c| raw.column_index(&c.name)).collect();

    let key_idx = columns
        .iter()
        .position(|c| c.name == schema.primary_key)
        .ok_or_else(|| StagingError::MissingColumn {
            table: name.to_string(),
            column: schema.primary_key.clone(),
        })?;

    let mut table = Table::new(name, columns);
    let mut seen = HashSet::new();

    for raw_row in &raw.rows {
        let cell = |i: usize| sources[i].map(|src| &raw_row[src]).unwrap_or(&NULL);

        let key = match specs[key_idx] {
            Some(spec) => coerce(cell(key_idx), spec).value,
            None => cell(key_idx).clone(),
        };
        let Some(key_string) = key.key_string() else {
            stats.null_keys += 1;
            continue;
        };
        if !seen.insert(key_string) {
            stats.duplicates += 1;
            continue;
        }

        let mut row = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            let Some(spec) = spec else {
                row.push(cell(i).clone());
                continue;
            };
            let result = coerce(cell(i), spec);
            if result.invalid {
                *stats.invalid.entry(spec.name.clone()).or_default() += 1;
            }
            if result.out_of_domain {
                *stats.out_of_domain.entry(spec.name.clone()).or_default() += 1;
            }
            if result.clamped {
                *stats.clamped.entry(spec.name.clone()).or_default() += 1;
            }
            row.push(result.value);
        }
        table.push_row(row);
    }
    stats.output_rows = table.len();

    report(schema, &stats, &mut diagnostics);
    info!(
        "  {}: {} -> {} rows (dropped {} null keys, {} duplicates)",
        name, stats.input_rows, stats.output_rows, stats.null_keys, stats.duplicates
    );

    Ok(Staged {
        table,
        stats,
        diagnostics,
    })
}

fn report(schema: &SourceSchema, stats: &StageStats, diags: &mut Diagnostics) {
    let name = schema.source.name();
    let key = &schema.primary_key;

    diags.warn(
        Stage::Stage,
        name,
        format!("NULL {} rows removed", key),
        stats.null_keys,
    );
    for (column, count) in &stats.invalid {
        diags.warn(
            Stage::Stage,
            name,
            format!("invalid {} values converted to NULL", column),
            *count,
        );
    }
    for (column, count) in &stats.out_of_domain {
        let domain = schema
            .column(column)
            .map(|spec| spec.domain.to_string())
            .unwrap_or_default();
        diags.warn(
            Stage::Stage,
            name,
            format!("{} values outside {}", column, domain),
            *count,
        );
    }
    for (column, count) in &stats.clamped {
        diags.warn(
            Stage::Stage,
            name,
            format!("{} values clamped into range", column),
            *count,
        );
    }
    diags.warn(
        Stage::Stage,
        name,
        format!("duplicate {} rows removed", key),
        stats.duplicates,
    );
}

fn stage_source(raw: &Table, source: Source) -> StagingResult<Staged> {
    let _span = info_span!("stage", table = source.name()).entered();
    debug!(rows = raw.len(), "Staging");
    stage_table(raw, &source.schema())
}

/// Stage users: parse signup dates, title-case gender, trim city.
pub fn stage_users(raw: &Table) -> StagingResult<Staged> {
    stage_source(raw, Source::Users)
}

/// Stage products: parse prices and ratings, title-case category, trim brand.
pub fn stage_products(raw: &Table) -> StagingResult<Staged> {
    stage_source(raw, Source::Products)
}

/// Stage orders: parse dates and amounts, lower-case status.
pub fn stage_orders(raw: &Table) -> StagingResult<Staged> {
    stage_source(raw, Source::Orders)
}

/// Stage order items: parse quantities, prices and supplied totals.
pub fn stage_order_items(raw: &Table) -> StagingResult<Staged> {
    stage_source(raw, Source::OrderItems)
}

/// Stage events: parse timestamps, lower-case event type.
pub fn stage_events(raw: &Table) -> StagingResult<Staged> {
    stage_source(raw, Source::Events)
}

/// Stage reviews: parse dates, clamp ratings into [1, 5].
pub fn stage_reviews(raw: &Table) -> StagingResult<Staged> {
    stage_source(raw, Source::Reviews)
}

/// The six staged tables.
#[derive(Debug, Clone, Default)]
pub struct StagedTables {
    tables: BTreeMap<Source, Table>,
}

impl StagedTables {
    pub fn insert(&mut self, source: Source, table: Table) {
        self.tables.insert(source, table);
    }

    pub fn get(&self, source: Source) -> Option<&Table> {
        self.tables.get(&source)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Stage every extracted source in processing order.
pub fn stage_all(raw: &RawTables, diags: &mut Diagnostics) -> StagingResult<StagedTables> {
    let mut staged = StagedTables::default();

    for source in Source::ALL {
        let extracted = raw.get(source).ok_or_else(|| StagingError::MissingSource {
            table: source.name().to_string(),
        })?;
        let result = match source {
            Source::Users => stage_users(&extracted.table),
            Source::Products => stage_products(&extracted.table),
            Source::Orders => stage_orders(&extracted.table),
            Source::OrderItems => stage_order_items(&extracted.table),
            Source::Events => stage_events(&extracted.table),
            Source::Reviews => stage_reviews(&extracted.table),
        }?;
        diags.extend(result.diagnostics);
        staged.insert(source, result.table);
    }

    Ok(staged)
}

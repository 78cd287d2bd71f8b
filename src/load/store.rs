//! SQLite sink for warehouse tables.
//!
//! Every table is replaced wholesale: drop, create from the in-memory column
//! types, insert all rows. The three steps share one transaction so a failed
//! insert leaves the previous contents in place.

use std::path::Path;

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use crate::model::{Column, DataType, Table, Value};
use crate::sql::{quote_ident, CreateTable, DropTable, Insert};

/// Error type for the SQLite sink.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("table '{0}' has no columns")]
    NoColumns(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Date(_) | Value::Timestamp(_) => {
                ToSqlOutput::Owned(SqlValue::Text(self.to_field()))
            }
        })
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Value::Text(String::from_utf8_lossy(t).into_owned())
        }
    }
}

/// A SQLite database holding warehouse tables.
pub struct WarehouseStore {
    conn: Connection,
}

impl WarehouseStore {
    /// Open (or create) the database file, creating its parent directory.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Replace `table` in the database. Returns the number of rows inserted.
    pub fn replace_table(&mut self, table: &Table) -> StoreResult<usize> {
        if table.columns.is_empty() {
            return Err(StoreError::NoColumns(table.name.clone()));
        }

        let drop_sql = DropTable::new(&table.name).if_exists().to_sql();
        let create_sql = CreateTable::for_columns(&table.name, &table.columns).to_sql();
        let insert_sql = Insert::into(&table.name)
            .columns(table.column_names())
            .to_sql();

        let tx = self.conn.transaction()?;
        tx.execute(&drop_sql, [])?;
        tx.execute(&create_sql, [])?;
        {
            let mut stmt = tx.prepare(&insert_sql)?;
            for row in &table.rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
        }
        tx.commit()?;

        debug!(table = %table.name, rows = table.len(), "Replaced table in database");
        Ok(table.len())
    }

    /// Number of rows currently stored in `name`.
    pub fn row_count(&self, name: &str) -> StoreResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(name));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// User tables in the database, sorted by name.
    pub fn table_names(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Read a stored table back. Columns come back as `Text`; values keep the
    /// storage class SQLite returns.
    pub fn read_table(&self, name: &str) -> StoreResult<Table> {
        let sql = format!("SELECT * FROM {}", quote_ident(name));
        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<Column> = stmt
            .column_names()
            .into_iter()
            .map(|c| Column::new(c, DataType::Text))
            .collect();
        let width = columns.len();

        let mut table = Table::new(name, columns);
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(from_sql(row.get_ref(i)?));
            }
            table.push_row(values);
        }
        Ok(table)
    }
}

/// Replace one table in the database at `db_path`.
///
/// The connection is opened for this table only and closed on return.
pub fn save_to_store(table: &Table, db_path: &Path) -> StoreResult<usize> {
    let mut store = WarehouseStore::open(db_path)?;
    store.replace_table(table)
}

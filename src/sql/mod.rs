//! SQL generation for the SQLite warehouse store.
//!
//! - [`ddl`] - CREATE TABLE and DROP TABLE
//! - [`dml`] - parameterized INSERT
//!
//! Statements are built with small builders and rendered with `to_sql()`.
//! Identifiers are always double-quoted so warehouse column names never
//! collide with SQLite keywords.

pub mod ddl;
pub mod dml;

pub use ddl::{ColumnDef, CreateTable, DropTable};
pub use dml::Insert;

/// Quote an identifier with double quotes, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

//! DDL (Data Definition Language) support.
//!
//! # Examples
//!
//! ```
//! use storeflow::sql::{ColumnDef, CreateTable};
//! use storeflow::model::DataType;
//!
//! let table = CreateTable::new("dim_users")
//!     .column(ColumnDef::new("user_id", DataType::Text))
//!     .column(ColumnDef::new("signup_year", DataType::Integer));
//!
//! assert_eq!(
//!     table.to_sql(),
//!     r#"CREATE TABLE "dim_users" ("user_id" TEXT, "signup_year" INTEGER)"#
//! );
//! ```

use super::quote_ident;
use crate::model::{Column, DataType};

// ============================================================================
// CREATE TABLE
// ============================================================================

/// CREATE TABLE statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl CreateTable {
    /// Create a new CREATE TABLE statement.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Add a column definition.
    pub fn column(mut self, col: ColumnDef) -> Self {
        self.columns.push(col);
        self
    }

    /// Add multiple column definitions.
    pub fn columns(mut self, cols: impl IntoIterator<Item = ColumnDef>) -> Self {
        self.columns.extend(cols);
        self
    }

    /// Build the statement for an in-memory table's columns.
    pub fn for_columns(name: impl Into<String>, columns: &[Column]) -> Self {
        Self::new(name).columns(
            columns
                .iter()
                .map(|c| ColumnDef::new(c.name.clone(), c.data_type)),
        )
    }

    /// Convert to SQL.
    pub fn to_sql(&self) -> String {
        let mut sql = String::from("CREATE TABLE ");
        sql.push_str(&quote_ident(&self.name));
        sql.push_str(" (");
        let cols: Vec<String> = self.columns.iter().map(ColumnDef::to_sql).collect();
        sql.push_str(&cols.join(", "));
        sql.push(')');
        sql
    }
}

// ============================================================================
// Column Definition
// ============================================================================

/// Column definition for CREATE TABLE.
///
/// Columns carry only a type affinity. Warehouse tables allow nulls in every
/// column and keys are checked by validation, not by constraints.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDef {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    pub fn to_sql(&self) -> String {
        format!(
            "{} {}",
            quote_ident(&self.name),
            self.data_type.sqlite_affinity()
        )
    }
}

// ============================================================================
// DROP TABLE
// ============================================================================

/// DROP TABLE statement.
#[derive(Debug, Clone)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct DropTable {
    pub if_exists: bool,
    pub name: String,
}

impl DropTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            if_exists: false,
            name: name.into(),
        }
    }

    /// Add IF EXISTS clause.
    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    pub fn to_sql(&self) -> String {
        if self.if_exists {
            format!("DROP TABLE IF EXISTS {}", quote_ident(&self.name))
        } else {
            format!("DROP TABLE {}", quote_ident(&self.name))
        }
    }
}

//! Tabular data model shared by every pipeline stage.

pub mod schema;
pub mod table;
pub mod types;
pub mod value;

pub use schema::{ColumnSpec, Domain, Normalization, Source, SourceSchema};
pub use table::{Column, Table};
pub use types::DataType;
pub use value::{is_null_token, parse_date, parse_number, parse_timestamp, Value};

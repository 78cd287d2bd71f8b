//! # storeflow
//!
//! A batch ETL pipeline that turns six e-commerce CSV exports into a
//! star-schema warehouse.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │   users, products, orders, order_items, events, reviews  │
//! │                     (raw CSV files)                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [extract]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 RawTables (all text)                     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [staging]
//! ┌─────────────────────────────────────────────────────────┐
//! │   StagedTables (typed, keyed, deduplicated, normalized)  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [warehouse]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Warehouse: dim_users, dim_products, fact_orders,       │
//! │   fact_order_items, fact_events, fact_reviews            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!            ┌─────────────┴─────────────┐
//!            ▼ [load]                    ▼ [validation]
//! ┌──────────────────────┐    ┌──────────────────────────────┐
//! │  processed CSVs      │    │  primary keys, foreign keys, │
//! │  + SQLite database   │    │  date and numeric ranges     │
//! └──────────────────────┘    └──────────────────────────────┘
//! ```
//!
//! [`pipeline::Pipeline`] runs the stages in order. Data-quality problems are
//! collected as [`diagnostics::Issue`]s and never stop a run; only missing
//! structure (columns, directories) is fatal.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod load;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod sql;
pub mod staging;
pub mod state;
pub mod validation;
pub mod warehouse;

pub use error::{PipelineError, Result};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::diagnostics::{Diagnostics, Issue, Severity};
    pub use crate::model::{Column, DataType, Source, Table, Value};
    pub use crate::pipeline::{Pipeline, RunOutcome, RunReport, Stage, SuccessPolicy};
    pub use crate::state::RunState;
    pub use crate::validation::{CheckFamily, CheckResult, ValidationReport};
    pub use crate::warehouse::{Warehouse, WarehouseTable};
}

//! Warehouse stage: build the star schema from the staged tables.
//!
//! ```text
//!                 ┌──────────────┐
//!                 │  dim_users   │
//!                 └──────▲───────┘
//!          user_id ┌─────┴──────┐ user_id
//!     ┌────────────┤            ├────────────┐
//! ┌───┴────────┐   │            │   ┌────────┴────┐
//! │fact_orders │   │            │   │ fact_events │
//! └───▲────────┘   │            │   └─────────────┘
//!     │ order_id   │            │
//! ┌───┴──────────────┐   ┌──────┴───────┐
//! │ fact_order_items ├──►│ dim_products │◄── product_id ── fact_reviews
//! └──────────────────┘   └──────────────┘
//! ```

mod dimension;
mod fact;

pub use dimension::{build_dim_products, build_dim_users, price_bucket, PRICE_BUCKETS, TOP_PRICE_BUCKET};
pub use fact::{
    build_fact_events, build_fact_order_items, build_fact_orders, build_fact_reviews,
    flag_references, line_total,
};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::diagnostics::Diagnostics;
use crate::model::{Source, Table};
use crate::pipeline::Stage;
use crate::staging::StagedTables;

/// Errors that abort the build stage.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{table}: input is missing column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("{table}: staged input '{source_table}' is missing")]
    MissingInput { table: String, source_table: String },
}

pub type BuildResult<T> = Result<T, BuildError>;

/// The six warehouse tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseTable {
    DimUsers,
    DimProducts,
    FactOrders,
    FactOrderItems,
    FactEvents,
    FactReviews,
}

impl WarehouseTable {
    pub const ALL: [WarehouseTable; 6] = [
        WarehouseTable::DimUsers,
        WarehouseTable::DimProducts,
        WarehouseTable::FactOrders,
        WarehouseTable::FactOrderItems,
        WarehouseTable::FactEvents,
        WarehouseTable::FactReviews,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WarehouseTable::DimUsers => "dim_users",
            WarehouseTable::DimProducts => "dim_products",
            WarehouseTable::FactOrders => "fact_orders",
            WarehouseTable::FactOrderItems => "fact_order_items",
            WarehouseTable::FactEvents => "fact_events",
            WarehouseTable::FactReviews => "fact_reviews",
        }
    }

    pub fn primary_key(&self) -> &'static str {
        match self {
            WarehouseTable::DimUsers => "user_id",
            WarehouseTable::DimProducts => "product_id",
            WarehouseTable::FactOrders => "order_id",
            WarehouseTable::FactOrderItems => "order_item_id",
            WarehouseTable::FactEvents => "event_id",
            WarehouseTable::FactReviews => "review_id",
        }
    }

    /// The staged source this table is built from.
    pub fn source(&self) -> Source {
        match self {
            WarehouseTable::DimUsers => Source::Users,
            WarehouseTable::DimProducts => Source::Products,
            WarehouseTable::FactOrders => Source::Orders,
            WarehouseTable::FactOrderItems => Source::OrderItems,
            WarehouseTable::FactEvents => Source::Events,
            WarehouseTable::FactReviews => Source::Reviews,
        }
    }
}

impl std::fmt::Display for WarehouseTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Check that `input` carries every column a builder reads.
///
/// Missing columns are fatal. An input without rows is only a warning.
pub(crate) fn require_columns(
    input: &Table,
    target: WarehouseTable,
    columns: &[&str],
    diags: &mut Diagnostics,
) -> BuildResult<()> {
    if let Some(column) = columns.iter().find(|c| !input.has_column(c)) {
        return Err(BuildError::MissingColumn {
            table: target.name().to_string(),
            column: column.to_string(),
        });
    }
    if input.is_empty() {
        diags.warn(Stage::Build, target.name(), "input has no rows", 1);
    }
    Ok(())
}

/// The built star schema.
#[derive(Debug, Clone, Default)]
pub struct Warehouse {
    tables: BTreeMap<WarehouseTable, Table>,
}

impl Warehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, which: WarehouseTable, table: Table) {
        self.tables.insert(which, table);
    }

    pub fn get(&self, which: WarehouseTable) -> Option<&Table> {
        self.tables.get(&which)
    }

    /// Tables in warehouse order.
    pub fn iter(&self) -> impl Iterator<Item = (WarehouseTable, &Table)> {
        self.tables.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(Table::len).sum()
    }
}

/// Build all dimension and fact tables.
pub fn build_warehouse(stg: &StagedTables, diags: &mut Diagnostics) -> BuildResult<Warehouse> {
    let input = |target: WarehouseTable| {
        stg.get(target.source()).ok_or_else(|| BuildError::MissingInput {
            table: target.name().to_string(),
            source_table: target.source().name().to_string(),
        })
    };

    let dim_users = build_dim_users(input(WarehouseTable::DimUsers)?, diags)?;
    let dim_products = build_dim_products(input(WarehouseTable::DimProducts)?, diags)?;
    let fact_orders = build_fact_orders(input(WarehouseTable::FactOrders)?, &dim_users, diags)?;
    let fact_order_items = build_fact_order_items(
        input(WarehouseTable::FactOrderItems)?,
        &fact_orders,
        &dim_products,
        diags,
    )?;
    let fact_events = build_fact_events(input(WarehouseTable::FactEvents)?, &dim_users, diags)?;
    let fact_reviews =
        build_fact_reviews(input(WarehouseTable::FactReviews)?, &dim_products, diags)?;

    let mut warehouse = Warehouse::new();
    warehouse.insert(WarehouseTable::DimUsers, dim_users);
    warehouse.insert(WarehouseTable::DimProducts, dim_products);
    warehouse.insert(WarehouseTable::FactOrders, fact_orders);
    warehouse.insert(WarehouseTable::FactOrderItems, fact_order_items);
    warehouse.insert(WarehouseTable::FactEvents, fact_events);
    warehouse.insert(WarehouseTable::FactReviews, fact_reviews);

    info!("Warehouse summary:");
    info!("  Total rows across all tables: {}", warehouse.total_rows());
    Ok(warehouse)
}

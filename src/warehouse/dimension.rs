// src/warehouse/dimension.rs
use chrono::Datelike;
use tracing::{debug, info, info_span};

use super::{require_columns, BuildResult, WarehouseTable};
use crate::diagnostics::Diagnostics;
use crate::model::{Column, DataType, Table, Value};

/// Upper bounds (exclusive) of the price buckets, in ascending order.
/// Prices at or above the last bound fall in [`TOP_PRICE_BUCKET`].
pub const PRICE_BUCKETS: &[(f64, &str)] = &[(25.0, "budget"), (100.0, "standard"), (500.0, "premium")];

pub const TOP_PRICE_BUCKET: &str = "luxury";

/// Bucket a price into its ordered category.
pub fn price_bucket(price: f64) -> &'static str {
    PRICE_BUCKETS
        .iter()
        .find(|(bound, _)| price < *bound)
        .map(|(_, label)| *label)
        .unwrap_or(TOP_PRICE_BUCKET)
}

/// Build `dim_users`: staged users plus `signup_year` and `signup_month`.
pub fn build_dim_users(stg_users: &Table, diags: &mut Diagnostics) -> BuildResult<Table> {
    let target = WarehouseTable::DimUsers;
    let _span = info_span!("build", table = target.name()).entered();
    require_columns(stg_users, target, &["user_id", "signup_date"], diags)?;

    let mut df = stg_users.renamed(target.name());
    df.set_column(Column::new("signup_year", DataType::Integer), |t, i| {
        date_part(t, i, "signup_date", |d| d.year() as i64)
    });
    df.set_column(Column::new("signup_month", DataType::Integer), |t, i| {
        date_part(t, i, "signup_date", |d| d.month() as i64)
    });
    debug!("Added signup_year and signup_month columns");

    info!("  {}: {} rows x {} columns", target, df.len(), df.columns.len());
    Ok(df)
}

/// Build `dim_products`: staged products plus `price_bucket`.
pub fn build_dim_products(stg_products: &Table, diags: &mut Diagnostics) -> BuildResult<Table> {
    let target = WarehouseTable::DimProducts;
    let _span = info_span!("build", table = target.name()).entered();
    require_columns(stg_products, target, &["product_id", "price"], diags)?;

    let mut df = stg_products.renamed(target.name());
    df.set_column(Column::new("price_bucket", DataType::Text), |t, i| {
        t.get(i, "price")
            .and_then(Value::as_f64)
            .map(|p| Value::Text(price_bucket(p).to_string()))
            .unwrap_or(Value::Null)
    });

    info!("  {}: {} rows x {} columns", target, df.len(), df.columns.len());
    Ok(df)
}

/// Extract a part of the date in `column`, or `Null` when the date is missing.
pub(super) fn date_part(
    table: &Table,
    row: usize,
    column: &str,
    part: impl Fn(chrono::NaiveDate) -> i64,
) -> Value {
    table
        .get(row, column)
        .and_then(Value::as_date)
        .map(|d| Value::Integer(part(d)))
        .unwrap_or(Value::Null)
}

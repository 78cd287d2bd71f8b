//! Fact table builders.
//!
//! Facts keep one row per staged row. Foreign keys are resolved against the
//! dimension (or parent fact) and the outcome is stored in a boolean
//! `<parent>_fk_valid` column. Rows that fail to resolve are kept.

use chrono::{Datelike, Timelike};
use tracing::{debug, info, info_span};

use super::dimension::date_part;
use super::{require_columns, BuildResult, WarehouseTable};
use crate::diagnostics::Diagnostics;
use crate::model::{Column, DataType, Table, Value};
use crate::pipeline::Stage;

/// Tolerance when comparing a supplied line total with quantity x price.
const TOTAL_TOLERANCE: f64 = 0.005;

/// Add `flag` to `table`: true when `fk` is non-null and present in
/// `parent.parent_key`. Returns the number of rows that failed to resolve.
pub fn flag_references(
    table: &mut Table,
    fk: &str,
    parent: &Table,
    parent_key: &str,
    flag: &str,
    diags: &mut Diagnostics,
) -> usize {
    let keys = parent.key_set(parent_key);
    let mut unresolved = 0;
    table.set_column(Column::new(flag, DataType::Boolean), |t, i| {
        let valid = t
            .get(i, fk)
            .and_then(Value::key_string)
            .is_some_and(|k| keys.contains(&k));
        if !valid {
            unresolved += 1;
        }
        Value::Boolean(valid)
    });
    diags.warn(
        Stage::Build,
        &table.name,
        format!(
            "{} values not found in {}.{}",
            fk, parent.name, parent_key
        ),
        unresolved,
    );
    unresolved
}

/// Build `fact_orders`: staged orders plus `order_year`, `order_month` and
/// `user_fk_valid`.
pub fn build_fact_orders(
    stg_orders: &Table,
    dim_users: &Table,
    diags: &mut Diagnostics,
) -> BuildResult<Table> {
    let target = WarehouseTable::FactOrders;
    let _span = info_span!("build", table = target.name()).entered();
    require_columns(stg_orders, target, &["order_id", "user_id", "order_date"], diags)?;

    let mut df = stg_orders.renamed(target.name());
    df.set_column(Column::new("order_year", DataType::Integer), |t, i| {
        date_part(t, i, "order_date", |d| d.year() as i64)
    });
    df.set_column(Column::new("order_month", DataType::Integer), |t, i| {
        date_part(t, i, "order_date", |d| d.month() as i64)
    });
    flag_references(&mut df, "user_id", dim_users, "user_id", "user_fk_valid", diags);

    info!("  {}: {} rows x {} columns", target, df.len(), df.columns.len());
    Ok(df)
}

/// Build `fact_order_items`: `item_total` is always `quantity x item_price`.
/// Supplied totals that disagree are counted.
pub fn build_fact_order_items(
    stg_order_items: &Table,
    fact_orders: &Table,
    dim_products: &Table,
    diags: &mut Diagnostics,
) -> BuildResult<Table> {
    let target = WarehouseTable::FactOrderItems;
    let _span = info_span!("build", table = target.name()).entered();
    require_columns(
        stg_order_items,
        target,
        &["order_item_id", "order_id", "product_id", "quantity", "item_price"],
        diags,
    )?;

    let mut df = stg_order_items.renamed(target.name());

    let mut mismatched = 0;
    let mut filled = 0;
    df.set_column(Column::new("item_total", DataType::Float), |t, i| {
        let computed = line_total(t, i);
        match (t.get(i, "item_total").and_then(Value::as_f64), computed) {
            (Some(supplied), Some(total)) if (supplied - total).abs() > TOTAL_TOLERANCE => {
                mismatched += 1
            }
            (None, Some(_)) => filled += 1,
            _ => {}
        }
        Value::from(computed)
    });
    debug!(filled, "Computed item_total from quantity x price");
    diags.warn(
        Stage::Build,
        target.name(),
        "supplied item_total differs from quantity x item_price, recomputed",
        mismatched,
    );

    flag_references(&mut df, "order_id", fact_orders, "order_id", "order_fk_valid", diags);
    flag_references(
        &mut df,
        "product_id",
        dim_products,
        "product_id",
        "product_fk_valid",
        diags,
    );

    info!("  {}: {} rows x {} columns", target, df.len(), df.columns.len());
    Ok(df)
}

/// `quantity x item_price` for one row, if both are present.
pub fn line_total(table: &Table, row: usize) -> Option<f64> {
    let quantity = table.get(row, "quantity").and_then(Value::as_f64)?;
    let price = table.get(row, "item_price").and_then(Value::as_f64)?;
    Some(quantity * price)
}

/// Build `fact_events`: staged events plus `event_date`, `event_hour` and
/// `user_fk_valid`.
pub fn build_fact_events(
    stg_events: &Table,
    dim_users: &Table,
    diags: &mut Diagnostics,
) -> BuildResult<Table> {
    let target = WarehouseTable::FactEvents;
    let _span = info_span!("build", table = target.name()).entered();
    require_columns(stg_events, target, &["event_id", "user_id", "event_timestamp"], diags)?;

    let mut df = stg_events.renamed(target.name());
    df.set_column(Column::new("event_date", DataType::Date), |t, i| {
        t.get(i, "event_timestamp")
            .and_then(Value::as_timestamp)
            .map(|ts| Value::Date(ts.date()))
            .unwrap_or(Value::Null)
    });
    df.set_column(Column::new("event_hour", DataType::Integer), |t, i| {
        t.get(i, "event_timestamp")
            .and_then(Value::as_timestamp)
            .map(|ts| Value::Integer(ts.hour() as i64))
            .unwrap_or(Value::Null)
    });
    debug!("Added event_date and event_hour columns");
    flag_references(&mut df, "user_id", dim_users, "user_id", "user_fk_valid", diags);

    info!("  {}: {} rows x {} columns", target, df.len(), df.columns.len());
    Ok(df)
}

/// Build `fact_reviews`: staged reviews plus `product_fk_valid`.
pub fn build_fact_reviews(
    stg_reviews: &Table,
    dim_products: &Table,
    diags: &mut Diagnostics,
) -> BuildResult<Table> {
    let target = WarehouseTable::FactReviews;
    let _span = info_span!("build", table = target.name()).entered();
    require_columns(stg_reviews, target, &["review_id", "product_id", "rating"], diags)?;

    let mut df = stg_reviews.renamed(target.name());
    flag_references(
        &mut df,
        "product_id",
        dim_products,
        "product_id",
        "product_fk_valid",
        diags,
    );

    info!("  {}: {} rows x {} columns", target, df.len(), df.columns.len());
    Ok(df)
}

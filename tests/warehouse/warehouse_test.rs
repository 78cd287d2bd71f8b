use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use storeflow::diagnostics::Diagnostics;
use storeflow::extract::extract_all;
use storeflow::model::{Source, Value};
use storeflow::staging::{stage_all, StagedTables};
use storeflow::warehouse::{build_warehouse, line_total, BuildError, WarehouseTable};

fn write_sources(dir: &Path) {
    let files = [
        (
            "users.csv",
            "user_id,signup_date,gender,city\n1,2023-01-05,f,Lyon\n2,2023-11-20,m,Paris\n",
        ),
        (
            "products.csv",
            "product_id,category,brand,price\np1,books,Acme,12.5\np2,tech,Volt,99.99\np3,tech,Volt,100\np4,home,Nest,750\n",
        ),
        (
            "orders.csv",
            "order_id,user_id,order_date,order_status,total_amount\no1,1,2024-02-03,SHIPPED,37.5\no2,9,2024-02-04,pending,99.99\n",
        ),
        (
            "order_items.csv",
            "order_item_id,order_id,product_id,quantity,item_price,item_total\ni1,o1,p1,3,12.5,37.5\ni2,o2,p2,1,99.99,120\ni3,o3,p2,2,99.99,\ni4,o1,px,1,5,5\n",
        ),
        (
            "events.csv",
            "event_id,user_id,event_type,event_timestamp,product_id\ne1,1,VIEW,2024-02-03 14:22:05,p1\ne2,,click,2024-02-03 09:00:00,\ne3,2,purchase,2024-03-09T23:30:00+02:00,p2\n",
        ),
        (
            "reviews.csv",
            "review_id,product_id,user_id,rating,review_date\nr1,p1,1,4,2024-02-10\nr2,p9,2,5,2024-02-11\n",
        ),
    ];
    for (name, contents) in files {
        fs::write(dir.join(name), contents).unwrap();
    }
}

fn staged() -> (StagedTables, Diagnostics) {
    let dir = tempfile::tempdir().unwrap();
    write_sources(dir.path());
    let mut diags = Diagnostics::new();
    let raw = extract_all(dir.path(), &mut diags).unwrap();
    let stg = stage_all(&raw, &mut diags).unwrap();
    (stg, diags)
}

fn flags(values: impl Iterator<Item = Value>) -> Vec<bool> {
    values.map(|v| v.as_bool().unwrap()).collect()
}

#[test]
fn test_builds_six_tables_row_for_row() {
    let (stg, mut diags) = staged();
    let warehouse = build_warehouse(&stg, &mut diags).unwrap();

    assert_eq!(warehouse.len(), 6);
    for (which, table) in warehouse.iter() {
        assert_eq!(table.name, which.name());
        assert_eq!(table.len(), stg.get(which.source()).unwrap().len());
    }
}

#[test]
fn test_dimension_attributes() {
    let (stg, mut diags) = staged();
    let warehouse = build_warehouse(&stg, &mut diags).unwrap();

    let users = warehouse.get(WarehouseTable::DimUsers).unwrap();
    assert_eq!(users.len(), 2);
    for row in 0..users.len() {
        let signup = users.get(row, "signup_date").and_then(Value::as_date).unwrap();
        assert_eq!(
            users.get(row, "signup_year"),
            Some(&Value::Integer(i64::from(signup.year())))
        );
        assert_eq!(
            users.get(row, "signup_month"),
            Some(&Value::Integer(i64::from(signup.month())))
        );
    }
    assert_eq!(users.get(1, "signup_month"), Some(&Value::Integer(11)));

    let products = warehouse.get(WarehouseTable::DimProducts).unwrap();
    let buckets: Vec<String> = products
        .column_values("price_bucket")
        .unwrap()
        .map(|v| v.to_field())
        .collect();
    assert_eq!(buckets, vec!["budget", "standard", "premium", "luxury"]);

    for which in [WarehouseTable::DimUsers, WarehouseTable::DimProducts] {
        let table = warehouse.get(which).unwrap();
        assert_eq!(table.key_set(which.primary_key()).len(), table.len(), "{}", which);
    }
}

#[test]
fn test_foreign_key_flags() {
    let (stg, mut diags) = staged();
    let warehouse = build_warehouse(&stg, &mut diags).unwrap();

    let orders = warehouse.get(WarehouseTable::FactOrders).unwrap();
    assert_eq!(
        flags(orders.column_values("user_fk_valid").unwrap().cloned()),
        vec![true, false]
    );

    let items = warehouse.get(WarehouseTable::FactOrderItems).unwrap();
    assert_eq!(
        flags(items.column_values("order_fk_valid").unwrap().cloned()),
        vec![true, true, false, true]
    );
    assert_eq!(
        flags(items.column_values("product_fk_valid").unwrap().cloned()),
        vec![true, true, true, false]
    );

    // a null user id never resolves
    let events = warehouse.get(WarehouseTable::FactEvents).unwrap();
    assert_eq!(
        flags(events.column_values("user_fk_valid").unwrap().cloned()),
        vec![true, false, true]
    );

    let reviews = warehouse.get(WarehouseTable::FactReviews).unwrap();
    assert_eq!(
        flags(reviews.column_values("product_fk_valid").unwrap().cloned()),
        vec![true, false]
    );
}

#[test]
fn test_item_total_is_quantity_times_price() {
    let (stg, mut diags) = staged();
    let warehouse = build_warehouse(&stg, &mut diags).unwrap();
    let items = warehouse.get(WarehouseTable::FactOrderItems).unwrap();

    for row in 0..items.len() {
        let total = items.get(row, "item_total").and_then(Value::as_f64);
        assert_eq!(total, line_total(items, row));
    }
    // the supplied 120 disagreed with 1 x 99.99
    assert!(diags
        .for_table("fact_order_items")
        .any(|i| i.message.contains("item_total") && i.count == 1));
}

#[test]
fn test_event_date_and_hour() {
    let (stg, mut diags) = staged();
    let warehouse = build_warehouse(&stg, &mut diags).unwrap();
    let events = warehouse.get(WarehouseTable::FactEvents).unwrap();

    assert_eq!(
        events.get(0, "event_date"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 2, 3).unwrap()))
    );
    assert_eq!(events.get(0, "event_hour"), Some(&Value::Integer(14)));
    assert_eq!(events.get(0, "event_type"), Some(&Value::from("view")));

    // an offset timestamp keeps its own wall-clock hour and date
    assert_eq!(events.get(2, "event_hour"), Some(&Value::Integer(23)));
    assert_eq!(
        events.get(2, "event_date"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()))
    );
}

#[test]
fn test_missing_staged_input_is_fatal() {
    let (stg, mut diags) = staged();
    let mut partial = StagedTables::default();
    for source in [Source::Users, Source::Products] {
        partial.insert(source, stg.get(source).unwrap().clone());
    }

    let err = build_warehouse(&partial, &mut diags).unwrap_err();
    assert!(matches!(err, BuildError::MissingInput { ref table, .. } if table == "fact_orders"));
}

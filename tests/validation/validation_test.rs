use chrono::NaiveDate;
use storeflow::diagnostics::Diagnostics;
use storeflow::load::{read_processed, save_to_file};
use storeflow::model::{Column, DataType, Table, Value};
use storeflow::validation::{validate_all, CheckFamily};
use storeflow::warehouse::{Warehouse, WarehouseTable};

fn date(y: i32, m: u32, d: u32) -> Value {
    Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn table(name: &str, columns: &[(&str, DataType)], rows: Vec<Vec<Value>>) -> Table {
    let mut table = Table::new(
        name,
        columns
            .iter()
            .map(|(n, t)| Column::new(*n, *t))
            .collect(),
    );
    for row in rows {
        table.push_row(row);
    }
    table
}

/// A small warehouse with one orphan order item product and one future review.
fn warehouse() -> Warehouse {
    let mut warehouse = Warehouse::new();
    warehouse.insert(
        WarehouseTable::DimUsers,
        table(
            "dim_users",
            &[("user_id", DataType::Text), ("signup_date", DataType::Date)],
            vec![
                vec![Value::from("1"), date(2023, 1, 1)],
                vec![Value::from("2"), date(2023, 6, 1)],
            ],
        ),
    );
    warehouse.insert(
        WarehouseTable::DimProducts,
        table(
            "dim_products",
            &[("product_id", DataType::Text), ("price", DataType::Float)],
            vec![
                vec![Value::from("p1"), Value::Float(10.0)],
                vec![Value::from("p2"), Value::Float(-1.0)],
            ],
        ),
    );
    warehouse.insert(
        WarehouseTable::FactOrders,
        table(
            "fact_orders",
            &[
                ("order_id", DataType::Text),
                ("user_id", DataType::Text),
                ("order_date", DataType::Date),
                ("total_amount", DataType::Float),
            ],
            vec![vec![
                Value::from("o1"),
                Value::from("1"),
                date(2024, 1, 2),
                Value::Float(20.0),
            ]],
        ),
    );
    warehouse.insert(
        WarehouseTable::FactOrderItems,
        table(
            "fact_order_items",
            &[
                ("order_item_id", DataType::Text),
                ("order_id", DataType::Text),
                ("product_id", DataType::Text),
                ("quantity", DataType::Integer),
                ("item_price", DataType::Float),
            ],
            vec![
                vec![
                    Value::from("i1"),
                    Value::from("o1"),
                    Value::from("p1"),
                    Value::Integer(2),
                    Value::Float(10.0),
                ],
                vec![
                    Value::from("i2"),
                    Value::from("o1"),
                    Value::from("p404"),
                    Value::Integer(0),
                    Value::Float(3.0),
                ],
            ],
        ),
    );
    warehouse.insert(
        WarehouseTable::FactEvents,
        table(
            "fact_events",
            &[
                ("event_id", DataType::Text),
                ("user_id", DataType::Text),
                ("event_timestamp", DataType::Timestamp),
            ],
            vec![vec![
                Value::from("e1"),
                Value::from("2"),
                Value::Timestamp(
                    NaiveDate::from_ymd_opt(2024, 1, 3)
                        .unwrap()
                        .and_hms_opt(8, 0, 0)
                        .unwrap(),
                ),
            ]],
        ),
    );
    warehouse.insert(
        WarehouseTable::FactReviews,
        table(
            "fact_reviews",
            &[
                ("review_id", DataType::Text),
                ("product_id", DataType::Text),
                ("rating", DataType::Float),
                ("review_date", DataType::Date),
            ],
            vec![
                vec![
                    Value::from("r1"),
                    Value::from("p1"),
                    Value::Float(4.0),
                    date(2024, 1, 5),
                ],
                vec![
                    Value::from("r2"),
                    Value::from("p2"),
                    Value::Float(5.0),
                    date(2030, 1, 1),
                ],
            ],
        ),
    );
    warehouse
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

#[test]
fn test_each_family_counts_its_violations() {
    let mut diags = Diagnostics::new();
    let report = validate_all(&warehouse(), today(), &mut diags);

    assert!(!report.passed());
    assert_eq!(report.family(CheckFamily::PrimaryKey).count(), 6);
    assert!(report.family(CheckFamily::PrimaryKey).all(|c| c.passed));

    assert_eq!(
        report.violations("fact_order_items.product_id -> dim_products.product_id"),
        Some(1)
    );
    assert_eq!(
        report.violations("fact_orders.user_id -> dim_users.user_id"),
        Some(0)
    );
    assert_eq!(report.violations("fact_reviews.review_date <= today"), Some(1));
    assert_eq!(report.violations("dim_products.price >= 0"), Some(1));
    assert_eq!(report.violations("fact_order_items.quantity > 0"), Some(1));
    assert_eq!(report.total_violations(), 4);
    assert!(report.checks.iter().all(|c| !c.skipped));
    assert!(diags.is_empty());
}

#[test]
fn test_read_back_tables_validate_identically() {
    let dir = tempfile::tempdir().unwrap();
    let typed = warehouse();
    for (_, table) in typed.iter() {
        save_to_file(table, dir.path()).unwrap();
    }
    let read_back = read_processed(dir.path()).unwrap();

    let mut diags = Diagnostics::new();
    let expected = validate_all(&typed, today(), &mut diags);
    let actual = validate_all(&read_back, today(), &mut diags);
    assert_eq!(actual, expected);
}

#[test]
fn test_missing_column_is_skipped_with_warning() {
    let mut warehouse = warehouse();
    warehouse.insert(
        WarehouseTable::FactEvents,
        table(
            "fact_events",
            &[("event_id", DataType::Text), ("user_id", DataType::Text)],
            vec![],
        ),
    );

    let mut diags = Diagnostics::new();
    let report = validate_all(&warehouse, today(), &mut diags);
    let check = report.check("fact_events.event_timestamp <= today").unwrap();
    assert!(check.skipped);
    assert!(check.passed);
    assert_eq!(diags.for_table("fact_events").count(), 1);
}

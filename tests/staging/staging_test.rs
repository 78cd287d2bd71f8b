use chrono::NaiveDate;
use storeflow::model::{Column, DataType, Table, Value};
use storeflow::staging::{
    stage_order_items, stage_products, stage_reviews, stage_users, StagingError,
};

fn raw(name: &str, header: &[&str], rows: &[&[&str]]) -> Table {
    let mut table = Table::new(
        name,
        header.iter().map(|h| Column::new(*h, DataType::Text)).collect(),
    );
    for row in rows {
        table.push_row(row.iter().map(|v| Value::from_raw(v)).collect());
    }
    table
}

fn users() -> Table {
    raw(
        "users",
        &["user_id", "signup_date", "gender", "city"],
        &[
            &["1", "2023-01-05", "female", "  Lyon "],
            &["", "2023-01-06", "male", "Paris"],
            &["1", "2023-01-07", "male", "Nice"],
            &["2", "not-a-date", "  NON   binary ", "Lille"],
        ],
    )
}

#[test]
fn test_null_and_duplicate_keys_are_removed() {
    let staged = stage_users(&users()).unwrap();

    assert_eq!(staged.stats.input_rows, 4);
    assert_eq!(staged.stats.null_keys, 1);
    assert_eq!(staged.stats.duplicates, 1);
    assert_eq!(staged.table.len(), 2);
    // first occurrence wins
    assert_eq!(staged.table.get(0, "city"), Some(&Value::from("Lyon")));
}

#[test]
fn test_columns_are_typed_and_normalized() {
    let staged = stage_users(&users()).unwrap();
    let table = &staged.table;

    assert_eq!(
        table.get(0, "signup_date"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2023, 1, 5).unwrap()))
    );
    assert_eq!(table.get(0, "gender"), Some(&Value::from("Female")));
    assert_eq!(table.get(1, "gender"), Some(&Value::from("Non Binary")));
    assert_eq!(table.get(1, "signup_date"), Some(&Value::Null));
    assert_eq!(staged.stats.invalid_in("signup_date"), 1);
}

#[test]
fn test_staging_is_idempotent() {
    let once = stage_users(&users()).unwrap();
    let twice = stage_users(&once.table).unwrap();

    assert_eq!(twice.table, once.table);
    assert_eq!(twice.stats.null_keys, 0);
    assert_eq!(twice.stats.duplicates, 0);
}

#[test]
fn test_ratings_are_clamped_and_reported() {
    let reviews = raw(
        "reviews",
        &["review_id", "product_id", "rating", "review_date"],
        &[
            &["r1", "p1", "0", "2024-01-01"],
            &["r2", "p1", "3", "2024-01-02"],
            &["r3", "p2", "6", "2024-01-03"],
            &["r4", "p2", "5", "2024-01-04"],
        ],
    );

    let staged = stage_reviews(&reviews).unwrap();
    assert_eq!(staged.stats.out_of_domain_in("rating"), 2);
    assert_eq!(staged.stats.clamped_in("rating"), 2);

    let ratings: Vec<f64> = staged
        .table
        .column_values("rating")
        .unwrap()
        .filter_map(Value::as_f64)
        .collect();
    assert_eq!(ratings, vec![1.0, 3.0, 5.0, 5.0]);
    assert!(staged.diagnostics.len() >= 2);
}

#[test]
fn test_fractional_quantity_is_invalid() {
    let items = raw(
        "order_items",
        &["order_item_id", "order_id", "product_id", "quantity", "item_price"],
        &[&["i1", "o1", "p1", "2", "3.50"], &["i2", "o1", "p2", "1.5", "2.00"]],
    );

    let staged = stage_order_items(&items).unwrap();
    assert_eq!(staged.table.get(0, "quantity"), Some(&Value::Integer(2)));
    assert_eq!(staged.table.get(1, "quantity"), Some(&Value::Null));
    assert_eq!(staged.stats.invalid_in("quantity"), 1);
    assert!(staged.table.has_column("item_total"));
}

#[test]
fn test_missing_required_column_names_table_and_column() {
    let orders = raw("users", &["user_id", "gender", "city"], &[&["1", "f", "Lyon"]]);
    match stage_users(&orders) {
        Err(StagingError::MissingColumn { table, column }) => {
            assert_eq!(table, "users");
            assert_eq!(column, "signup_date");
        }
        other => panic!("expected MissingColumn, got {:?}", other.map(|s| s.table)),
    }
}

#[test]
fn test_misplaced_commas_make_prices_invalid() {
    let products = raw(
        "products",
        &["product_id", "category", "brand", "price"],
        &[
            &["p1", "toys", "Acme", "1,5"],
            &["p2", "toys", "Acme", "12,34,5"],
            &["p3", "toys", "Acme", "1,250.50"],
        ],
    );
    let staged = stage_products(&products).unwrap();

    assert_eq!(staged.table.get(0, "price"), Some(&Value::Null));
    assert_eq!(staged.table.get(1, "price"), Some(&Value::Null));
    assert_eq!(staged.table.get(2, "price"), Some(&Value::Float(1250.5)));
    assert_eq!(staged.stats.invalid_in("price"), 2);
}

#[test]
fn test_gender_placeholder_does_not_survive_as_text() {
    let table = raw(
        "users",
        &["user_id", "signup_date", "gender", "city"],
        &[&["1", "2023-01-05", " n/a ", "Lyon"], &["2", "2023-01-05", "none", "Lyon"]],
    );
    let staged = stage_users(&table).unwrap();

    assert_eq!(staged.table.get(0, "gender"), Some(&Value::Null));
    assert_eq!(staged.table.get(1, "gender"), Some(&Value::Null));
}

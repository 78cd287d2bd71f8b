use std::fs;

use chrono::NaiveDate;
use storeflow::config::Settings;
use storeflow::diagnostics::Diagnostics;
use storeflow::load::{load_warehouse, read_processed, save_to_file, LoadError, WarehouseStore};
use storeflow::model::{Column, DataType, Table, Value};
use storeflow::warehouse::{Warehouse, WarehouseTable};

fn dim_users(ids: &[&str]) -> Table {
    let mut table = Table::new(
        "dim_users",
        vec![
            Column::new("user_id", DataType::Text),
            Column::new("signup_date", DataType::Date),
            Column::new("signup_year", DataType::Integer),
        ],
    );
    for id in ids {
        table.push_row(vec![
            Value::from(*id),
            Value::Date(NaiveDate::from_ymd_opt(2023, 4, 1).unwrap()),
            Value::Integer(2023),
        ]);
    }
    table
}

fn warehouse(ids: &[&str]) -> Warehouse {
    let mut warehouse = Warehouse::new();
    warehouse.insert(WarehouseTable::DimUsers, dim_users(ids));
    warehouse.insert(
        WarehouseTable::DimProducts,
        Table::new(
            "dim_products",
            vec![
                Column::new("product_id", DataType::Text),
                Column::new("price", DataType::Float),
            ],
        ),
    );
    warehouse
}

#[test]
fn test_csv_round_trip_preserves_rows_and_keys() {
    let dir = tempfile::tempdir().unwrap();
    let table = dim_users(&["1", "2", "3"]);
    save_to_file(&table, dir.path()).unwrap();

    let back = read_processed(dir.path()).unwrap();
    let users = back.get(WarehouseTable::DimUsers).unwrap();
    assert_eq!(users.len(), 3);
    assert_eq!(users.key_set("user_id"), table.key_set("user_id"));
    assert_eq!(
        users.get(0, "signup_date").and_then(Value::as_date),
        NaiveDate::from_ymd_opt(2023, 4, 1)
    );
    // tables that were never written come back empty
    assert!(back.get(WarehouseTable::FactReviews).unwrap().is_empty());
}

#[test]
fn test_load_warehouse_writes_both_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::rooted_at(dir.path());
    let mut diags = Diagnostics::new();

    let summary = load_warehouse(&warehouse(&["1", "2"]), &settings, &mut diags).unwrap();

    assert!(summary.all_succeeded());
    assert_eq!(summary.files.succeeded, vec!["dim_users", "dim_products"]);
    assert_eq!(summary.store.succeeded, vec!["dim_users", "dim_products"]);
    assert!(summary.bytes_written > 0);

    let processed = settings.paths.processed_dir().unwrap();
    assert!(processed.join("dim_users.csv").exists());
    assert_eq!(
        fs::read_to_string(processed.join("dim_products.csv")).unwrap(),
        "product_id,price\n"
    );
    // the empty dimension is written but warned about
    assert_eq!(diags.for_table("dim_products").count(), 1);
}

#[test]
fn test_reloading_replaces_database_tables() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::rooted_at(dir.path());
    let mut diags = Diagnostics::new();

    load_warehouse(&warehouse(&["1", "2", "3"]), &settings, &mut diags).unwrap();
    load_warehouse(&warehouse(&["7"]), &settings, &mut diags).unwrap();

    let store = WarehouseStore::open(&settings.paths.database().unwrap()).unwrap();
    assert_eq!(store.row_count("dim_users").unwrap(), 1);
    assert_eq!(store.table_names().unwrap(), vec!["dim_products", "dim_users"]);

    let users = store.read_table("dim_users").unwrap();
    assert_eq!(users.get(0, "user_id"), Some(&Value::from("7")));
    assert_eq!(users.get(0, "signup_year"), Some(&Value::Integer(2023)));
}

#[test]
fn test_store_failure_does_not_stop_csv_sink() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::rooted_at(dir.path());
    // a directory cannot be opened as a database
    let not_a_db = dir.path().join("db_dir");
    fs::create_dir_all(&not_a_db).unwrap();
    settings.paths.database = not_a_db.to_string_lossy().into_owned();

    let mut diags = Diagnostics::new();
    let summary = load_warehouse(&warehouse(&["1"]), &settings, &mut diags).unwrap();

    assert_eq!(summary.files.succeeded.len(), 2);
    assert_eq!(summary.store.failed, vec!["dim_users", "dim_products"]);
    assert!(!summary.all_succeeded());
    assert!(diags.has_errors());
}

#[test]
fn test_unusable_output_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::rooted_at(dir.path());
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    settings.paths.processed_dir = blocker.join("processed").to_string_lossy().into_owned();

    let mut diags = Diagnostics::new();
    let err = load_warehouse(&warehouse(&["1"]), &settings, &mut diags).unwrap_err();
    assert!(matches!(err, LoadError::OutputDir { .. }));
}

use std::fs;
use std::path::Path;

use storeflow::diagnostics::{Diagnostics, Severity};
use storeflow::extract::{extract_all, read_csv};
use storeflow::model::{Source, Value};
use storeflow::pipeline::Stage;

fn write(dir: &Path, name: &str, contents: &str) {
    fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_extract_all_reads_present_and_flags_missing() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "users.csv",
        "user_id,signup_date,gender,city\n1,2023-01-05,f,Lyon\n2,2023-02-11,m,Paris\n",
    );
    write(
        dir.path(),
        "products.csv",
        "product_id,category,brand,price\np1,books,Acme,12.5\n",
    );

    let mut diags = Diagnostics::new();
    let raw = extract_all(dir.path(), &mut diags).unwrap();

    assert_eq!(raw.len(), 6);
    assert_eq!(raw.get(Source::Users).unwrap().table.len(), 2);
    assert!(!raw.get(Source::Users).unwrap().missing);
    assert!(raw.get(Source::Events).unwrap().missing);

    let missing: Vec<&str> = diags
        .issues()
        .iter()
        .filter(|i| i.stage == Stage::Extract && i.severity == Severity::Warning)
        .map(|i| i.table.as_str())
        .collect();
    assert_eq!(missing, vec!["orders", "order_items", "events", "reviews"]);
}

#[test]
fn test_every_cell_is_raw_text() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "orders.csv",
        "order_id,user_id,order_date,order_status,total_amount\n7,3,2024-01-01,Shipped,19.99\n",
    );

    let table = read_csv(&dir.path().join("orders.csv"), "orders").unwrap();
    assert_eq!(table.get(0, "total_amount"), Some(&Value::from("19.99")));
    assert_eq!(table.get(0, "order_id"), Some(&Value::from("7")));
}

#[test]
fn test_header_only_file_is_empty_but_present() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "reviews.csv", "review_id,product_id,rating,review_date\n");

    let mut diags = Diagnostics::new();
    let raw = extract_all(dir.path(), &mut diags).unwrap();
    let reviews = raw.get(Source::Reviews).unwrap();
    assert!(!reviews.missing);
    assert!(reviews.table.is_empty());
    assert!(reviews.table.has_column("rating"));
    assert_eq!(diags.for_table("reviews").count(), 0);
}

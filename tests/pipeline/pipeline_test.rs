use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use storeflow::config::Settings;
use storeflow::load::WarehouseStore;
use storeflow::pipeline::{Pipeline, Stage, StageStatus, SuccessPolicy};
use storeflow::state::RunState;
use storeflow::validation::CheckFamily;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// Three users (one without an id), two products, two orders (one for an
/// unknown user). The other three sources are absent.
fn write_sources(raw_dir: &Path) {
    fs::create_dir_all(raw_dir).unwrap();
    fs::write(
        raw_dir.join("users.csv"),
        "user_id,signup_date,gender,city\n1,2024-01-10,female,Lyon\n,2024-01-11,male,Paris\n2,2024-02-01,male,Nice\n",
    )
    .unwrap();
    fs::write(
        raw_dir.join("products.csv"),
        "product_id,category,brand,price\np1,books,Acme,12.5\np2,tech,Volt,250\n",
    )
    .unwrap();
    fs::write(
        raw_dir.join("orders.csv"),
        "order_id,user_id,order_date,order_status,total_amount\no1,1,2024-03-01,shipped,12.5\no2,99,2024-03-02,pending,250\n",
    )
    .unwrap();
}

fn setup(policy: SuccessPolicy) -> (tempfile::TempDir, Settings) {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::rooted_at(dir.path());
    settings.pipeline.success_policy = policy;
    write_sources(&settings.paths.raw_dir().unwrap());
    (dir, settings)
}

#[test]
fn test_end_to_end_scenario() {
    let (_dir, settings) = setup(SuccessPolicy::LoadCompleted);
    let pipeline = Pipeline::new(settings.clone());

    let outcome = pipeline.run(RunState::default(), now());
    let report = &outcome.report;

    assert!(report.success);
    assert_eq!(report.exit_code(), 0);
    for stage in Stage::ALL {
        assert_eq!(report.status(stage), Some(&StageStatus::Completed));
    }

    let store = WarehouseStore::open(&settings.paths.database().unwrap()).unwrap();
    assert_eq!(store.row_count("dim_users").unwrap(), 2);
    assert_eq!(store.row_count("fact_orders").unwrap(), 2);
    assert_eq!(store.row_count("fact_events").unwrap(), 0);

    let orders = store.read_table("fact_orders").unwrap();
    let invalid = orders
        .column_values("user_fk_valid")
        .unwrap()
        .filter(|v| v.as_bool() == Some(false))
        .count();
    assert_eq!(invalid, 1);

    let validation = report.validation.as_ref().unwrap();
    assert_eq!(
        validation.violations("fact_orders.user_id -> dim_users.user_id"),
        Some(1)
    );
    assert_eq!(validation.total_violations(), 1);
    assert!(validation.checks.iter().all(|c| !c.skipped));
    assert_eq!(validation.family(CheckFamily::ForeignKey).filter(|c| !c.passed).count(), 1);
}

#[test]
fn test_success_advances_run_state() {
    let (_dir, settings) = setup(SuccessPolicy::LoadCompleted);
    let outcome = Pipeline::new(settings).run(RunState::default(), now());

    let state = &outcome.state;
    assert_eq!(state.last_run, Some(now()));
    assert_eq!(state.run_id.as_deref(), Some(outcome.report.run_id.as_str()));
    assert_eq!(state.tables.len(), 6);
    assert_eq!(state.tables["dim_users"].rows, 2);
    assert_eq!(state.tables["fact_reviews"].rows, 0);
}

#[test]
fn test_validation_policy_fails_on_violations_and_keeps_state() {
    let (_dir, settings) = setup(SuccessPolicy::ValidationPassed);
    let previous = RunState::default();

    let outcome = Pipeline::new(settings).run(previous.clone(), now());

    assert!(!outcome.report.success);
    assert_eq!(outcome.report.exit_code(), 1);
    assert_eq!(outcome.report.status(Stage::Load), Some(&StageStatus::Completed));
    assert_eq!(outcome.state, previous);
}

#[test]
fn test_extract_failure_halts_the_run() {
    let (_dir, settings) = setup(SuccessPolicy::LoadCompleted);
    fs::write(
        settings.paths.raw_dir().unwrap().join("reviews.csv"),
        "review_id,product_id,rating,review_date\nr1,p1,4\nr2,p1,5,2024-01-01,extra\n",
    )
    .unwrap();

    let outcome = Pipeline::new(settings.clone()).run(RunState::default(), now());
    let report = &outcome.report;

    // r1 is short and padded; r2 has one field too many.
    assert!(!report.success);
    assert!(matches!(
        report.status(Stage::Extract),
        Some(StageStatus::Failed(msg)) if msg.contains("line 3: expected 4 fields, saw 5")
    ));
    assert_eq!(report.status(Stage::Load), Some(&StageStatus::Skipped));
    assert_eq!(report.status(Stage::Validate), Some(&StageStatus::Skipped));
    assert!(report.validation.is_none());
    assert!(!settings.paths.database().unwrap().exists());
}

#[test]
fn test_load_failure_still_validates() {
    let (dir, mut settings) = setup(SuccessPolicy::LoadCompleted);
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "").unwrap();
    settings.paths.processed_dir = blocker.join("out").to_string_lossy().into_owned();

    let outcome = Pipeline::new(settings).run(RunState::default(), now());
    let report = &outcome.report;

    assert!(!report.success);
    assert!(matches!(report.status(Stage::Load), Some(StageStatus::Failed(_))));
    assert_eq!(report.status(Stage::Validate), Some(&StageStatus::Completed));
    assert!(report.validation.is_some());
    assert!(report.diagnostics.has_errors());
}

#[test]
fn test_validate_only_reads_processed_output() {
    let (_dir, settings) = setup(SuccessPolicy::LoadCompleted);
    let pipeline = Pipeline::new(settings);
    let outcome = pipeline.run(RunState::default(), now());
    let in_memory = outcome.report.validation.unwrap();

    let (on_disk, _diags) = pipeline.validate_only(now().date()).unwrap();
    assert_eq!(on_disk, in_memory);
}

#[test]
fn test_missing_raw_files_still_load_empty_tables() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::rooted_at(dir.path());
    fs::create_dir_all(settings.paths.raw_dir().unwrap()).unwrap();

    let outcome = Pipeline::new(settings.clone()).run(RunState::default(), now());

    assert!(outcome.report.success);
    let processed = settings.paths.processed_dir().unwrap();
    let header = fs::read_to_string(processed.join("fact_orders.csv")).unwrap();
    assert!(header.starts_with("order_id,user_id,order_date"));
    assert!(outcome.report.diagnostics.warnings().count() >= 6);
}

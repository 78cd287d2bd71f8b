//! Data-quality validation of the built warehouse.
//!
//! Four independent check families run over the warehouse tables:
//!
//! - primary keys: no nulls in each table's key column
//! - foreign keys: every non-null reference resolves to a parent key
//! - date ranges: no dates after the run date
//! - numeric ranges: prices, amounts, quantities and ratings in their domain
//!
//! Validation only reports. A table or column that is absent yields a
//! skipped check (counted as passed) and a warning.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, info_span, warn};

use crate::diagnostics::Diagnostics;
use crate::model::{Domain, Table};
use crate::pipeline::Stage;
use crate::warehouse::{Warehouse, WarehouseTable};

/// Check family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckFamily {
    PrimaryKey,
    ForeignKey,
    DateRange,
    NumericRange,
}

impl fmt::Display for CheckFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckFamily::PrimaryKey => "primary key",
            CheckFamily::ForeignKey => "foreign key",
            CheckFamily::DateRange => "date range",
            CheckFamily::NumericRange => "numeric range",
        })
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub family: CheckFamily,
    /// Stable name, e.g. `fact_orders.user_id -> dim_users.user_id`.
    pub name: String,
    pub passed: bool,
    pub violations: usize,
    /// The table or column was absent, so nothing was checked.
    pub skipped: bool,
}

impl CheckResult {
    fn counted(family: CheckFamily, name: String, violations: usize) -> Self {
        if violations > 0 {
            error!("  FAIL {}: {} violations", name, violations);
        } else {
            info!("  ok   {}", name);
        }
        Self {
            family,
            name,
            passed: violations == 0,
            violations,
            skipped: false,
        }
    }

    fn skipped(
        family: CheckFamily,
        name: String,
        table: &str,
        reason: &str,
        diags: &mut Diagnostics,
    ) -> Self {
        warn!("  Skipping {} ({})", name, reason);
        diags.warn(Stage::Validate, table, format!("skipped {}: {}", name, reason), 1);
        Self {
            family,
            name,
            passed: true,
            violations: 0,
            skipped: true,
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.skipped {
            "SKIP"
        } else if self.passed {
            "PASS"
        } else {
            "FAIL"
        };
        write!(
            f,
            "[{}] {} {}: {} violations",
            status, self.family, self.name, self.violations
        )
    }
}

/// All check results of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<CheckResult>,
}

impl ValidationReport {
    /// Every check passed.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn check(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Violations of the named check.
    pub fn violations(&self, name: &str) -> Option<usize> {
        self.check(name).map(|c| c.violations)
    }

    pub fn family(&self, family: CheckFamily) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(move |c| c.family == family)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn total_violations(&self) -> usize {
        self.checks.iter().map(|c| c.violations).sum()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            writeln!(f, "{}", check)?;
        }
        if self.passed() {
            write!(f, "All validation checks passed")
        } else {
            write!(
                f,
                "{} of {} checks failed ({} violations)",
                self.failed().count(),
                self.checks.len(),
                self.total_violations()
            )
        }
    }
}

/// A foreign-key relationship between two warehouse tables.
#[derive(Debug, Clone, Copy)]
pub struct Relationship {
    pub child: WarehouseTable,
    pub fk: &'static str,
    pub parent: WarehouseTable,
    pub pk: &'static str,
}

impl Relationship {
    pub fn name(&self) -> String {
        format!("{}.{} -> {}.{}", self.child, self.fk, self.parent, self.pk)
    }
}

pub const RELATIONSHIPS: [Relationship; 5] = [
    Relationship {
        child: WarehouseTable::FactOrders,
        fk: "user_id",
        parent: WarehouseTable::DimUsers,
        pk: "user_id",
    },
    Relationship {
        child: WarehouseTable::FactOrderItems,
        fk: "order_id",
        parent: WarehouseTable::FactOrders,
        pk: "order_id",
    },
    Relationship {
        child: WarehouseTable::FactOrderItems,
        fk: "product_id",
        parent: WarehouseTable::DimProducts,
        pk: "product_id",
    },
    Relationship {
        child: WarehouseTable::FactEvents,
        fk: "user_id",
        parent: WarehouseTable::DimUsers,
        pk: "user_id",
    },
    Relationship {
        child: WarehouseTable::FactReviews,
        fk: "product_id",
        parent: WarehouseTable::DimProducts,
        pk: "product_id",
    },
];

/// Date columns that must not lie in the future.
pub const DATE_COLUMNS: [(WarehouseTable, &str); 4] = [
    (WarehouseTable::DimUsers, "signup_date"),
    (WarehouseTable::FactOrders, "order_date"),
    (WarehouseTable::FactEvents, "event_timestamp"),
    (WarehouseTable::FactReviews, "review_date"),
];

/// Numeric columns and the domain their non-null values must fall in.
pub const NUMERIC_COLUMNS: [(WarehouseTable, &str, Domain); 5] = [
    (WarehouseTable::DimProducts, "price", Domain::NonNegative),
    (WarehouseTable::FactOrders, "total_amount", Domain::NonNegative),
    (WarehouseTable::FactOrderItems, "quantity", Domain::Positive),
    (WarehouseTable::FactOrderItems, "item_price", Domain::NonNegative),
    (
        WarehouseTable::FactReviews,
        "rating",
        Domain::Range { min: 1.0, max: 5.0 },
    ),
];

/// Look up `table.column`, or explain why it is unavailable.
fn lookup<'a>(
    warehouse: &'a Warehouse,
    table: WarehouseTable,
    column: &str,
) -> Result<&'a Table, String> {
    let found = warehouse
        .get(table)
        .ok_or_else(|| format!("table {} not found", table))?;
    if !found.has_column(column) {
        return Err(format!("column '{}' not found in {}", column, table));
    }
    Ok(found)
}

/// Null count in each table's primary key column.
pub fn check_primary_keys(warehouse: &Warehouse, diags: &mut Diagnostics) -> Vec<CheckResult> {
    info!("Validating primary keys for NULL values...");
    WarehouseTable::ALL
        .into_iter()
        .map(|which| {
            let pk = which.primary_key();
            let name = format!("{}.{} not null", which, pk);
            match lookup(warehouse, which, pk) {
                Ok(table) => {
                    let nulls = table.null_count(pk).unwrap_or(0);
                    CheckResult::counted(CheckFamily::PrimaryKey, name, nulls)
                }
                Err(reason) => {
                    CheckResult::skipped(CheckFamily::PrimaryKey, name, which.name(), &reason, diags)
                }
            }
        })
        .collect()
}

/// Child rows whose non-null foreign key has no matching parent key.
pub fn check_foreign_keys(warehouse: &Warehouse, diags: &mut Diagnostics) -> Vec<CheckResult> {
    info!("Validating referential integrity...");
    RELATIONSHIPS
        .iter()
        .map(|rel| {
            let name = rel.name();
            let tables = lookup(warehouse, rel.child, rel.fk)
                .and_then(|child| Ok((child, lookup(warehouse, rel.parent, rel.pk)?)));
            match tables {
                Ok((child, parent)) => {
                    let keys = parent.key_set(rel.pk);
                    let orphans = child
                        .column_values(rel.fk)
                        .map(|values| {
                            values
                                .filter_map(|v| v.key_string())
                                .filter(|k| !keys.contains(k))
                                .count()
                        })
                        .unwrap_or(0);
                    CheckResult::counted(CheckFamily::ForeignKey, name, orphans)
                }
                Err(reason) => CheckResult::skipped(
                    CheckFamily::ForeignKey,
                    name,
                    rel.child.name(),
                    &reason,
                    diags,
                ),
            }
        })
        .collect()
}

/// Dates strictly after `today`. Unparseable values are not counted.
pub fn check_date_ranges(
    warehouse: &Warehouse,
    today: NaiveDate,
    diags: &mut Diagnostics,
) -> Vec<CheckResult> {
    info!("Validating date ranges (no dates after {})...", today);
    DATE_COLUMNS
        .iter()
        .map(|&(which, column)| {
            let name = format!("{}.{} <= today", which, column);
            match lookup(warehouse, which, column) {
                Ok(table) => {
                    let future = table
                        .column_values(column)
                        .map(|values| {
                            values
                                .filter_map(|v| v.as_date())
                                .filter(|d| *d > today)
                                .count()
                        })
                        .unwrap_or(0);
                    CheckResult::counted(CheckFamily::DateRange, name, future)
                }
                Err(reason) => {
                    CheckResult::skipped(CheckFamily::DateRange, name, which.name(), &reason, diags)
                }
            }
        })
        .collect()
}

/// Non-null numeric values outside their column's domain.
pub fn check_numeric_ranges(warehouse: &Warehouse, diags: &mut Diagnostics) -> Vec<CheckResult> {
    info!("Validating numeric ranges...");
    NUMERIC_COLUMNS
        .iter()
        .map(|&(which, column, domain)| {
            let name = format!("{}.{} {}", which, column, domain);
            match lookup(warehouse, which, column) {
                Ok(table) => {
                    let invalid = table
                        .column_values(column)
                        .map(|values| {
                            values
                                .filter_map(|v| v.as_f64())
                                .filter(|x| !domain.contains(*x))
                                .count()
                        })
                        .unwrap_or(0);
                    CheckResult::counted(CheckFamily::NumericRange, name, invalid)
                }
                Err(reason) => CheckResult::skipped(
                    CheckFamily::NumericRange,
                    name,
                    which.name(),
                    &reason,
                    diags,
                ),
            }
        })
        .collect()
}

/// Run every check family. `today` bounds the date checks.
pub fn validate_all(
    warehouse: &Warehouse,
    today: NaiveDate,
    diags: &mut Diagnostics,
) -> ValidationReport {
    let _span = info_span!("validate").entered();
    info!("{}", "=".repeat(60));
    info!("DATA QUALITY VALIDATION");
    info!("{}", "=".repeat(60));

    let mut report = ValidationReport::default();
    report.checks.extend(check_primary_keys(warehouse, diags));
    report.checks.extend(check_foreign_keys(warehouse, diags));
    report.checks.extend(check_date_ranges(warehouse, today, diags));
    report.checks.extend(check_numeric_ranges(warehouse, diags));

    info!("{}", "=".repeat(60));
    if report.passed() {
        info!("ALL VALIDATION CHECKS PASSED");
    } else {
        warn!(
            "SOME VALIDATION CHECKS FAILED: {} violations across {} checks",
            report.total_violations(),
            report.failed().count()
        );
    }
    info!("{}", "=".repeat(60));
    report
}

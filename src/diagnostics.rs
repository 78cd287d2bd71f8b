//! Structured issues accumulated through a pipeline run.
//!
//! Data-quality problems never stop the pipeline. Each stage records them
//! here with a count so the run report can show what was dropped, coerced
//! or flagged without scraping the log.

use serde::Serialize;

use crate::pipeline::Stage;

/// Issue severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// A data-quality problem that was handled.
    Warning,
    /// A failure that aborted a stage or a table.
    Error,
}

/// One recorded issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub stage: Stage,
    pub table: String,
    pub message: String,
    /// Number of rows or values affected.
    pub count: usize,
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(
            f,
            "{} [{}] {}: {} ({})",
            level, self.stage, self.table, self.message, self.count
        )
    }
}

/// Collector for issues.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    issues: Vec<Issue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Record a warning. Zero counts are ignored.
    pub fn warn(&mut self, stage: Stage, table: &str, message: impl Into<String>, count: usize) {
        if count == 0 {
            return;
        }
        let message = message.into();
        tracing::warn!(%stage, table, count, "{}", message);
        self.push(Issue {
            severity: Severity::Warning,
            stage,
            table: table.to_string(),
            message,
            count,
        });
    }

    /// Record an error.
    pub fn error(&mut self, stage: Stage, table: &str, message: impl Into<String>, count: usize) {
        let message = message.into();
        tracing::error!(%stage, table, count, "{}", message);
        self.push(Issue {
            severity: Severity::Error,
            stage,
            table: table.to_string(),
            message,
            count,
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns true if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Returns only the warnings.
    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    /// Issues recorded for one table.
    pub fn for_table<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Issue> {
        self.issues.iter().filter(move |i| i.table == table)
    }
}

//! Pipeline orchestration.
//!
//! ```text
//!  Extract ──► Stage ──► Build ──► Load ──► Validate ──► End
//!     │          │         │         │
//!     ▼          ▼         ▼         ▼
//!   halt       halt    skip Load   Validate still runs
//!                      + Validate  on the in-memory warehouse
//! ```
//!
//! A fatal error at Extract or Stage halts the run. A fatal error at Build
//! leaves nothing to load or validate. A fatal error at Load does not stop
//! validation. Whether the run counts as a success is decided by the
//! configured [`SuccessPolicy`].

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::diagnostics::Diagnostics;
use crate::error::{PipelineError, Result};
use crate::extract::extract_all;
use crate::load::{load_warehouse, read_processed, LoadSummary};
use crate::staging::stage_all;
use crate::state::RunState;
use crate::validation::{validate_all, ValidationReport};
use crate::warehouse::build_warehouse;

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Stage,
    Build,
    Load,
    Validate,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Extract,
        Stage::Stage,
        Stage::Build,
        Stage::Load,
        Stage::Validate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Stage => "stage",
            Stage::Build => "build",
            Stage::Load => "load",
            Stage::Validate => "validate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// What a run must achieve to count as a success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessPolicy {
    /// The load stage ran to completion; per-table failures are tolerated.
    #[default]
    LoadCompleted,
    /// The load stage completed and no table failed in either sink.
    AllTablesLoaded,
    /// Every table loaded and every validation check passed.
    ValidationPassed,
}

impl SuccessPolicy {
    pub fn is_satisfied(
        &self,
        load: Option<&LoadSummary>,
        validation: Option<&ValidationReport>,
    ) -> bool {
        let Some(load) = load else {
            return false;
        };
        match self {
            SuccessPolicy::LoadCompleted => true,
            SuccessPolicy::AllTablesLoaded => load.all_succeeded(),
            SuccessPolicy::ValidationPassed => {
                load.all_succeeded() && validation.is_some_and(ValidationReport::passed)
            }
        }
    }
}

impl fmt::Display for SuccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SuccessPolicy::LoadCompleted => "load_completed",
            SuccessPolicy::AllTablesLoaded => "all_tables_loaded",
            SuccessPolicy::ValidationPassed => "validation_passed",
        })
    }
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum StageStatus {
    Completed,
    Failed(String),
    /// Not run because an earlier stage failed.
    Skipped,
}

/// Everything a run produced, apart from the tables themselves.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started: NaiveDateTime,
    pub policy: SuccessPolicy,
    pub stages: Vec<(Stage, StageStatus)>,
    pub diagnostics: Diagnostics,
    pub load: Option<LoadSummary>,
    pub validation: Option<ValidationReport>,
    pub success: bool,
}

impl RunReport {
    fn new(started: NaiveDateTime, policy: SuccessPolicy) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started,
            policy,
            stages: Vec::new(),
            diagnostics: Diagnostics::new(),
            load: None,
            validation: None,
            success: false,
        }
    }

    fn record(&mut self, stage: Stage, status: StageStatus) {
        self.stages.push((stage, status));
    }

    fn fail(&mut self, stage: Stage, err: &PipelineError) {
        error!("{} stage failed: {}", stage, err);
        self.diagnostics.error(stage, "pipeline", err.to_string(), 1);
        self.record(stage, StageStatus::Failed(err.to_string()));
    }

    /// Mark every stage not yet recorded as skipped.
    fn skip_remaining(&mut self) {
        for stage in Stage::ALL {
            if self.status(stage).is_none() {
                self.record(stage, StageStatus::Skipped);
            }
        }
    }

    pub fn status(&self, stage: Stage) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, status)| status)
    }

    /// Process exit code: 0 on success, 1 on failure.
    pub fn exit_code(&self) -> u8 {
        if self.success {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} ({})", self.run_id, self.policy)?;
        for (stage, status) in &self.stages {
            match status {
                StageStatus::Completed => writeln!(f, "  {:<9} completed", stage)?,
                StageStatus::Failed(reason) => writeln!(f, "  {:<9} FAILED: {}", stage, reason)?,
                StageStatus::Skipped => writeln!(f, "  {:<9} skipped", stage)?,
            }
        }
        if let Some(load) = &self.load {
            writeln!(
                f,
                "  CSV: {} ok, {} failed | Database: {} ok, {} failed",
                load.files.succeeded.len(),
                load.files.failed.len(),
                load.store.succeeded.len(),
                load.store.failed.len()
            )?;
        }
        if let Some(validation) = &self.validation {
            writeln!(
                f,
                "  Validation: {}/{} checks passed",
                validation.checks.len() - validation.failed().count(),
                validation.checks.len()
            )?;
        }
        writeln!(f, "  Warnings: {}", self.diagnostics.warnings().count())?;
        write!(f, "{}", if self.success { "SUCCESS" } else { "FAILED" })
    }
}

/// The report plus the run state to persist.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub state: RunState,
}

/// The ETL pipeline over one configuration.
pub struct Pipeline {
    settings: Settings,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run every stage.
    ///
    /// `now` stamps the run; its date bounds the validator's date checks. On
    /// success the returned state is advanced, otherwise `state` is returned
    /// unchanged.
    pub fn run(&self, state: RunState, now: NaiveDateTime) -> RunOutcome {
        let mut report = RunReport::new(now, self.settings.pipeline.success_policy);
        let _span = info_span!("pipeline", run_id = %report.run_id).entered();

        info!("{}", "=".repeat(60));
        info!("STARTING ETL PIPELINE");
        info!("Started at: {}", now.format("%Y-%m-%d %H:%M:%S"));
        if state.is_first_run() {
            info!("No previous successful run recorded");
        }
        info!("{}", "=".repeat(60));

        // Extract
        info!("STAGE 1: EXTRACT");
        let raw = match self
            .settings
            .paths
            .raw_dir()
            .map_err(PipelineError::from)
            .and_then(|dir| Ok(extract_all(&dir, &mut report.diagnostics)?))
        {
            Ok(raw) => raw,
            Err(e) => return self.halt(report, Stage::Extract, e, state),
        };
        info!("Extract complete: {} tables loaded", raw.len());
        report.record(Stage::Extract, StageStatus::Completed);

        // Stage
        info!("STAGE 2: TRANSFORM STAGING");
        let staged = match stage_all(&raw, &mut report.diagnostics) {
            Ok(staged) => staged,
            Err(e) => return self.halt(report, Stage::Stage, e.into(), state),
        };
        info!("Staging complete: {} tables staged", staged.len());
        report.record(Stage::Stage, StageStatus::Completed);

        // Build
        info!("STAGE 3: TRANSFORM WAREHOUSE");
        let warehouse = match build_warehouse(&staged, &mut report.diagnostics) {
            Ok(warehouse) => warehouse,
            Err(e) => return self.halt(report, Stage::Build, e.into(), state),
        };
        info!("Warehouse build complete: {} tables created", warehouse.len());
        report.record(Stage::Build, StageStatus::Completed);

        // Load
        info!("STAGE 4: LOAD");
        match load_warehouse(&warehouse, &self.settings, &mut report.diagnostics) {
            Ok(summary) => {
                info!("Load complete");
                report.load = Some(summary);
                report.record(Stage::Load, StageStatus::Completed);
            }
            Err(e) => report.fail(Stage::Load, &PipelineError::from(e)),
        }

        // Validate
        info!("STAGE 5: VALIDATE");
        let validation = validate_all(&warehouse, now.date(), &mut report.diagnostics);
        report.validation = Some(validation);
        report.record(Stage::Validate, StageStatus::Completed);

        report.success = report
            .policy
            .is_satisfied(report.load.as_ref(), report.validation.as_ref());

        info!("{}", "=".repeat(60));
        let state = if report.success {
            info!("ETL PIPELINE COMPLETED SUCCESSFULLY");
            let next = state.advanced(&report.run_id, now, &warehouse);
            if !state.is_first_run() {
                let changed: Vec<&str> = next.changed_since(&state).collect();
                info!("Tables changed since last run: {:?}", changed);
            }
            next
        } else {
            warn!("ETL PIPELINE FAILED under policy '{}'", report.policy);
            state
        };
        info!("{}", "=".repeat(60));

        RunOutcome { report, state }
    }

    /// Validate the processed CSVs already on disk without running the
    /// pipeline.
    pub fn validate_only(&self, today: NaiveDate) -> Result<(ValidationReport, Diagnostics)> {
        let dir = self.settings.paths.processed_dir()?;
        info!("Loading processed tables from {}", dir.display());
        let warehouse = read_processed(&dir)?;
        info!("Loaded {} tables", warehouse.len());

        let mut diags = Diagnostics::new();
        let report = validate_all(&warehouse, today, &mut diags);
        Ok((report, diags))
    }

    fn halt(
        &self,
        mut report: RunReport,
        stage: Stage,
        err: PipelineError,
        state: RunState,
    ) -> RunOutcome {
        report.fail(stage, &err);
        report.skip_remaining();
        error!("Pipeline execution halted at {}", stage);
        RunOutcome { report, state }
    }
}

//! storeflow CLI - build the e-commerce warehouse from raw CSVs
//!
//! Usage:
//!   storeflow run [--config <file>] [--full] [--policy <policy>]
//!   storeflow validate [--config <file>]
//!   storeflow status [--config <file>]
//!
//! Examples:
//!   storeflow run
//!   storeflow run --config storeflow.toml --policy all-tables-loaded
//!   storeflow validate

use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use storeflow::config::Settings;
use storeflow::logging::{self, LogGuard};
use storeflow::pipeline::{Pipeline, SuccessPolicy};
use storeflow::state::RunState;

#[derive(Parser)]
#[command(name = "storeflow")]
#[command(about = "storeflow - Build a star-schema warehouse from e-commerce CSV exports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: extract, stage, build, load, validate
    Run {
        /// Path to a storeflow.toml (defaults to the usual lookup)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Ignore the previous run state
        #[arg(long)]
        full: bool,

        /// What the run must achieve to exit successfully
        #[arg(short, long)]
        policy: Option<PolicyArg>,
    },

    /// Validate the processed tables already on disk
    Validate {
        /// Path to a storeflow.toml (defaults to the usual lookup)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show the last recorded run
    Status {
        /// Path to a storeflow.toml (defaults to the usual lookup)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum PolicyArg {
    /// The load stage ran to completion
    LoadCompleted,
    /// Every table reached both sinks
    AllTablesLoaded,
    /// Every table loaded and every validation check passed
    ValidationPassed,
}

impl From<PolicyArg> for SuccessPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::LoadCompleted => SuccessPolicy::LoadCompleted,
            PolicyArg::AllTablesLoaded => SuccessPolicy::AllTablesLoaded,
            PolicyArg::ValidationPassed => SuccessPolicy::ValidationPassed,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            full,
            policy,
        } => cmd_run(config, full, policy),
        Commands::Validate { config } => cmd_validate(config),
        Commands::Status { config } => cmd_status(config),
    }
}

fn load_settings(config: Option<PathBuf>) -> Option<Settings> {
    let result = match &config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    };
    match result {
        Ok(settings) => Some(settings),
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            None
        }
    }
}

fn init_logging(settings: &Settings, started: NaiveDateTime) -> Option<LogGuard> {
    let log_dir = match settings.paths.log_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error resolving log directory: {}", e);
            return None;
        }
    };
    match logging::init(&settings.logging, &log_dir, started) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

fn cmd_run(config: Option<PathBuf>, full: bool, policy: Option<PolicyArg>) -> ExitCode {
    let Some(mut settings) = load_settings(config) else {
        return ExitCode::FAILURE;
    };
    if let Some(policy) = policy {
        settings.pipeline.success_policy = policy.into();
    }

    let now = Local::now().naive_local();
    let Some(guard) = init_logging(&settings, now) else {
        return ExitCode::FAILURE;
    };

    let state_path = match settings.paths.state_file() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error resolving state file: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let state = if full {
        tracing::info!("Full load requested, ignoring previous state");
        RunState::default()
    } else {
        match RunState::load(&state_path) {
            Ok(state) => state,
            Err(e) => {
                tracing::error!("Failed to load state file: {}", e);
                RunState::default()
            }
        }
    };

    let outcome = Pipeline::new(settings).run(state, now);
    println!("{}", outcome.report);
    if let Some(file) = &guard.file {
        println!("Log file: {}", file.display());
    }

    if outcome.report.success {
        if let Err(e) = outcome.state.save(&state_path) {
            eprintln!("Error saving run state: {}", e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::from(outcome.report.exit_code())
}

fn cmd_validate(config: Option<PathBuf>) -> ExitCode {
    let Some(settings) = load_settings(config) else {
        return ExitCode::FAILURE;
    };
    let now = Local::now().naive_local();
    let Some(_guard) = init_logging(&settings, now) else {
        return ExitCode::FAILURE;
    };

    let require_pass = settings.pipeline.success_policy == SuccessPolicy::ValidationPassed;
    match Pipeline::new(settings).validate_only(now.date()) {
        Ok((report, diagnostics)) => {
            println!("{}", report);
            for issue in diagnostics.warnings() {
                println!("  {}", issue);
            }
            if require_pass && !report.passed() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Validation error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_status(config: Option<PathBuf>) -> ExitCode {
    let Some(settings) = load_settings(config) else {
        return ExitCode::FAILURE;
    };

    let state_path = match settings.paths.state_file() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error resolving state file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match RunState::load(&state_path) {
        Ok(state) => {
            println!("State file: {}", state_path.display());
            println!("{}", state);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error reading run state: {}", e);
            ExitCode::FAILURE
        }
    }
}

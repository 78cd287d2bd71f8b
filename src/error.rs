//! Crate-level error type.

use crate::config::SettingsError;
use crate::extract::ExtractError;
use crate::load::LoadError;
use crate::staging::StagingError;
use crate::state::StateError;
use crate::warehouse::BuildError;

/// Any error that aborts a stage or a command.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Extract failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Staging failed: {0}")]
    Staging(#[from] StagingError),

    #[error("Warehouse build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    #[error("Run state error: {0}")]
    State(#[from] StateError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

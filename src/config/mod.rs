//! Configuration module for storeflow.
//!
//! Handles the TOML settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, LoggingSettings, PathSettings, PipelineSettings, Settings, SettingsError,
};

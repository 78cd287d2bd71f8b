//! TOML-based configuration for storeflow.
//!
//! Supports a config file (storeflow.toml) with environment variable expansion
//! in every path.
//!
//! Example configuration:
//! ```toml
//! [paths]
//! raw_dir = "${DATA_ROOT}/raw"
//! processed_dir = "./data/processed"
//! database = "./ecommerce.db"
//! state_file = "./.etl_state.json"
//! log_dir = "./logs"
//!
//! [pipeline]
//! success_policy = "all_tables_loaded"
//!
//! [logging]
//! level = "info"
//! file_enabled = true
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pipeline::SuccessPolicy;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Input and output locations.
    pub paths: PathSettings,

    /// Run behaviour.
    pub pipeline: PipelineSettings,

    /// Log output.
    pub logging: LoggingSettings,
}

/// Input and output locations. Every value supports `${VAR}` expansion.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathSettings {
    /// Directory holding the six source CSVs.
    pub raw_dir: String,

    /// Directory the warehouse CSVs are written to.
    pub processed_dir: String,

    /// SQLite database file.
    pub database: String,

    /// Run-state JSON file.
    pub state_file: String,

    /// Directory for timestamped log files.
    pub log_dir: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            raw_dir: "data/raw".to_string(),
            processed_dir: "data/processed".to_string(),
            database: "ecommerce.db".to_string(),
            state_file: ".etl_state.json".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

impl PathSettings {
    pub fn raw_dir(&self) -> Result<PathBuf, SettingsError> {
        expand_path(&self.raw_dir)
    }

    pub fn processed_dir(&self) -> Result<PathBuf, SettingsError> {
        expand_path(&self.processed_dir)
    }

    pub fn database(&self) -> Result<PathBuf, SettingsError> {
        expand_path(&self.database)
    }

    pub fn state_file(&self) -> Result<PathBuf, SettingsError> {
        expand_path(&self.state_file)
    }

    pub fn log_dir(&self) -> Result<PathBuf, SettingsError> {
        expand_path(&self.log_dir)
    }

    /// Point every path below one root directory.
    pub fn rooted_at(root: &Path) -> Self {
        let join = |p: &str| root.join(p).to_string_lossy().into_owned();
        let defaults = Self::default();
        Self {
            raw_dir: join(&defaults.raw_dir),
            processed_dir: join(&defaults.processed_dir),
            database: join(&defaults.database),
            state_file: join(&defaults.state_file),
            log_dir: join(&defaults.log_dir),
        }
    }
}

/// Run behaviour.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// What a run must achieve to count as a success.
    pub success_policy: SuccessPolicy,
}

/// Log output.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Console level (`RUST_LOG` overrides it).
    pub level: String,

    /// Also write a debug-level log file per run.
    pub file_enabled: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: true,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.check()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `STOREFLOW_CONFIG`
    /// 2. `./storeflow.toml`
    /// 3. `~/.config/storeflow/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("STOREFLOW_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("storeflow.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("storeflow").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Settings with every path below `root`.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            paths: PathSettings::rooted_at(root),
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), SettingsError> {
        let paths = [
            ("raw_dir", &self.paths.raw_dir),
            ("processed_dir", &self.paths.processed_dir),
            ("database", &self.paths.database),
            ("state_file", &self.paths.state_file),
        ];
        for (key, value) in paths {
            if value.trim().is_empty() {
                return Err(SettingsError::InvalidConfig(format!(
                    "paths.{} must not be empty",
                    key
                )));
            }
        }
        Ok(())
    }
}

fn expand_path(raw: &str) -> Result<PathBuf, SettingsError> {
    expand_env_vars(raw).map(PathBuf::from)
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name = if chars.peek() == Some(&'{') {
            chars.next();
            let mut name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                name.push(ch);
            }
            name
        } else {
            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name))?;
        result.push_str(&value);
    }

    Ok(result)
}

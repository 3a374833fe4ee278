//! `courier.config.ron` loading
//!
//! ```text
//! Courier (
//!     dispatch: (
//!         retry: (max_retries: 3, retry_delay_ms: 1000),
//!         rate_limit: (count: 5, window_ms: 60000),
//!     ),
//!     primary: (name: "PrimaryProvider", success_rate: 0.5),
//!     fallback: (name: "SecondaryProvider", success_rate: 0.9, latency_ms: 200),
//!     messages: [
//!         (recipient: "alice@example.com", subject: "Welcome", body: "Hello!"),
//!     ],
//! )
//! ```

use std::path::{Path, PathBuf};

use courier_dispatch::{DispatchConfig, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backends::SimulatedBackendConfig;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "COURIER_CONFIG";

const DEFAULT_PATHS: [&str; 2] = ["./courier.config.ron", "/etc/courier/courier.config.ron"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{source_name} points to non-existent file: {}", path.display())]
    Missing { source_name: String, path: PathBuf },

    #[error("No configuration file found. Tried:\n{tried}")]
    NotFound { tried: String },

    #[error("Failed to read config from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config from {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

mod defaults {
    use crate::backends::SimulatedBackendConfig;

    pub fn primary() -> SimulatedBackendConfig {
        SimulatedBackendConfig::new("PrimaryProvider")
    }

    pub fn fallback() -> SimulatedBackendConfig {
        SimulatedBackendConfig::new("SecondaryProvider")
    }

    pub const fn shutdown_grace_secs() -> u64 {
        30
    }
}

/// One message to submit at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub recipient: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "Courier")]
pub struct CourierConfig {
    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default = "defaults::primary")]
    pub primary: SimulatedBackendConfig,

    #[serde(default = "defaults::fallback")]
    pub fallback: SimulatedBackendConfig,

    #[serde(default)]
    pub messages: Vec<Message>,

    /// How long queued dispatches may keep running after a shutdown request
    #[serde(default = "defaults::shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            primary: defaults::primary(),
            fallback: defaults::fallback(),
            messages: Vec::new(),
            shutdown_grace_secs: defaults::shutdown_grace_secs(),
        }
    }
}

impl CourierConfig {
    /// Check the dispatch settings and both backends, reporting every problem
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing each invalid field
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut problems = self
            .dispatch
            .validate()
            .err()
            .map(|e| e.problems)
            .unwrap_or_default();

        problems.extend(self.primary.problems("primary"));
        problems.extend(self.fallback.problems("fallback"));

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { problems })
        }
    }
}

/// Parse and validate the config at `path`
///
/// # Errors
///
/// Returns an error if the file can't be read, isn't valid RON or fails
/// validation
pub fn load_config(path: &Path) -> Result<CourierConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: CourierConfig = ron::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    config.validate()?;
    Ok(config)
}

/// Find the configuration file using the following precedence:
/// 1. `explicit`, from the `--config` flag
/// 2. `COURIER_CONFIG` environment variable
/// 3. ./courier.config.ron (current working directory)
/// 4. /etc/courier/courier.config.ron (system-wide config)
///
/// # Errors
///
/// Returns an error if an explicitly named file doesn't exist, or if none of
/// the default locations holds a config
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let defaults = DEFAULT_PATHS.map(PathBuf::from);
    resolve_config_path(explicit, std::env::var_os(CONFIG_ENV).map(PathBuf::from), &defaults)
}

fn resolve_config_path(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    defaults: &[PathBuf],
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return existing(path.to_path_buf(), "--config");
    }

    if let Some(path) = from_env {
        return existing(path, CONFIG_ENV);
    }

    if let Some(path) = defaults.iter().find(|path| path.exists()) {
        return Ok(path.clone());
    }

    let tried = std::iter::once(format!("  - {CONFIG_ENV} environment variable"))
        .chain(defaults.iter().map(|p| format!("  - {}", p.display())))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::NotFound { tried })
}

fn existing(path: PathBuf, source_name: &str) -> Result<PathBuf, ConfigError> {
    if path.exists() {
        Ok(path)
    } else {
        Err(ConfigError::Missing {
            source_name: source_name.to_string(),
            path,
        })
    }
}

//! Application configuration loading, validation, and management.
//!
//! The top-level `Config` combines the logging and health sections. It is
//! read from a TOML file when one can be found and validated before use;
//! without a file the built-in defaults apply.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{health::HealthConfig, logger::LoggerConfig};

pub mod health;
pub mod logger;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "SYSTEM_HEALTH_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "/etc/system-health/config.toml";

/// Timestamped console output for use before the tracing subscriber exists.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        $crate::config::print_line(console::style("INFO").green(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        $crate::config::print_line(console::style("WARN").yellow(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        $crate::config::print_line(console::style("ERROR").red(), format_args!($($arg)*))
    };
}

#[doc(hidden)]
pub fn print_line(level: console::StyledObject<&str>, args: std::fmt::Arguments<'_>) {
    let timestamp = time::format_description::parse(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z",
    )
    .ok()
    .and_then(|format| time::OffsetDateTime::now_utc().format(&format).ok())
    .unwrap_or_default();

    println!("{}  {} {}", console::style(timestamp).dim(), level, args);
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// Logging subsystem configuration.
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Provider budgets.
    #[validate(nested)]
    pub health: HealthConfig,
}

impl Config {
    /// Locates and loads the configuration file, falling back to defaults
    /// when none exists.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a file is found but cannot be read,
    /// parsed, or validated, or if `SYSTEM_HEALTH_CONFIG` names a missing file.
    pub fn new() -> Result<Self, ConfigError> {
        match Self::get_config_path()? {
            Some(path) => Self::load(&path),
            None => {
                print_warn!("No configuration file found, using defaults");
                Ok(Config::default())
            }
        }
    }

    /// Priority: `SYSTEM_HEALTH_CONFIG`, then `/etc/system-health/config.toml`.
    fn get_config_path() -> Result<Option<PathBuf>, ConfigError> {
        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(config_path);
            print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
            return Ok(Some(path));
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Ok(Some(fallback.to_path_buf()));
        }

        Ok(None)
    }

    /// Loads and validates configuration from `path`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::Config(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let config = Self::from_toml_str(&fs::read_to_string(path)?)?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(config)
    }
}

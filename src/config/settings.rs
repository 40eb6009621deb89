//! Application settings loaded from `config.toml`.
//!
//! Every key is optional; a missing file means "all defaults". A file that exists but
//! cannot be parsed, or that carries inconsistent thresholds, is a configuration error.

use crate::errors::{Error, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Category names seeded on first run.
pub const DEFAULT_CATEGORIES: [&str; 8] = [
    "Food",
    "Transport",
    "Bills",
    "Entertainment",
    "Shopping",
    "Health",
    "Education",
    "Other",
];

/// Top-level configuration, the whole of `config.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database URL; `DATABASE_URL` in the environment takes precedence
    pub database_url: Option<String>,
    /// Budget monitor and reminder policy
    pub monitor: MonitorConfig,
    /// First-run category seeding
    pub categories: CategoriesConfig,
}

/// Thresholds and timing for the budget monitor and the daily reminder
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Percentage of the budget at which spending counts as "near"
    pub near_threshold_percent: f64,
    /// Percentage of the budget at which spending counts as "over"
    pub over_threshold_percent: f64,
    /// Seconds between periodic re-evaluations while watching
    pub evaluation_interval_secs: u64,
    /// Local time of day (`HH:MM`) after which the daily reminder may fire
    pub reminder_time: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            near_threshold_percent: 80.0,
            over_threshold_percent: 100.0,
            evaluation_interval_secs: 300,
            reminder_time: "20:00".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Parsed [`MonitorConfig::reminder_time`].
    pub fn reminder_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.reminder_time, "%H:%M").map_err(|e| Error::Config {
            message: format!("Invalid reminder_time '{}': {e}", self.reminder_time),
        })
    }

    /// Periodic re-evaluation interval.
    #[must_use]
    pub const fn evaluation_interval(&self) -> Duration {
        Duration::from_secs(self.evaluation_interval_secs)
    }

    fn validate(&self) -> Result<()> {
        let near = self.near_threshold_percent;
        let over = self.over_threshold_percent;
        if !near.is_finite() || !over.is_finite() || near <= 0.0 || near >= over {
            return Err(Error::Config {
                message: format!(
                    "Thresholds must satisfy 0 < near < over, got near={near} over={over}"
                ),
            });
        }
        if self.evaluation_interval_secs == 0 {
            return Err(Error::Config {
                message: "evaluation_interval_secs must be greater than zero".to_string(),
            });
        }
        self.reminder_time()?;
        Ok(())
    }
}

/// Categories inserted when the category table is empty
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CategoriesConfig {
    /// Names to seed
    pub defaults: Vec<String>,
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            defaults: DEFAULT_CATEGORIES.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Parses and validates a configuration document.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.monitor.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file exists but cannot be read
/// - The TOML syntax is invalid
/// - The monitor thresholds or reminder time are inconsistent
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No configuration file at {:?}, using defaults", path);
        return Ok(AppConfig::default());
    }
    debug!("Loading configuration from {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path:?}: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads configuration from `path`, or `./config.toml` when none is given.
pub fn load_app_configuration(path: Option<&Path>) -> Result<AppConfig> {
    load_config(path.unwrap_or_else(|| Path::new("config.toml")))
}

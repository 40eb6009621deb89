/// Database connection and table management
pub mod database;

/// Application settings loaded from `config.toml`
pub mod settings;

pub use settings::{AppConfig, MonitorConfig, load_app_configuration};

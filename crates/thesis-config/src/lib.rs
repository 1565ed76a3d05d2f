//! # thesis-config
//!
//! Layered configuration loading for the thesis supervision engine using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`THESIS_*` prefix, `__` as separator)
//! 2. Project-level `.thesis/config.toml`
//! 3. User-level `~/.config/thesis/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `THESIS_DATABASE__PATH` -> `database.path`,
//! `THESIS_GRADING__PASS_MARK` -> `grading.pass_mark`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use thesis_config::ThesisConfig;
//!
//! let config = ThesisConfig::load_with_dotenv().expect("config");
//! let offset = config.clock.offset().expect("valid offset");
//! println!("deadlines resolve in {offset}");
//! ```

mod clock;
mod database;
mod error;
mod events;
mod workflow;

pub use clock::ClockConfig;
pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use events::EventsConfig;
pub use workflow::{ApplicationsConfig, GradingConfig};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project-local directory holding the database and config file.
pub const PROJECT_DIR: &str = ".thesis";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ThesisConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub clock: ClockConfig,
    #[serde(default)]
    pub grading: GradingConfig,
    #[serde(default)]
    pub applications: ApplicationsConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

impl ThesisConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is invalid.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Load with an explicit project config file instead of `.thesis/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is invalid.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("THESIS_").split("__"));
        Self::from_figment(&figment)
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment directly or add providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(PROJECT_DIR).join("config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("THESIS_").split("__"))
    }

    /// Extract and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is invalid.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clock.offset()?;
        self.grading.policy()?;
        if self.events.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "events.channel_capacity".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("thesis").join("config.toml"))
    }
}

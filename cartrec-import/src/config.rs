//! Configuration resolution
//!
//! Priority: environment variables override the TOML file, which overrides
//! built-in defaults. Tenant records live in the database and are resolved
//! separately by slug.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Engine-level settings (per-tenant settings live on the tenant row)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Local entity store path
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// How long a cart stays eligible for recovery attribution
    #[serde(default = "default_recovery_window_days")]
    pub recovery_window_days: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            recovery_window_days: default_recovery_window_days(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("cartrec.db")
}

fn default_recovery_window_days() -> i64 {
    30
}

impl AppConfig {
    /// Load config: defaults, then the TOML file when present, then
    /// environment overrides.
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let mut config = match toml_path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                let parsed: AppConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))?;
                info!("Configuration loaded from {}", path.display());
                parsed
            }
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        if let Ok(path) = std::env::var("CARTREC_DATABASE") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(days) = std::env::var("CARTREC_RECOVERY_WINDOW_DAYS") {
            config.recovery_window_days = days
                .parse()
                .map_err(|_| Error::Config(format!("Invalid CARTREC_RECOVERY_WINDOW_DAYS: {days}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.recovery_window_days < 1 {
            return Err(Error::Config(format!(
                "recovery_window_days must be at least 1, got {}",
                self.recovery_window_days
            )));
        }
        Ok(())
    }
}

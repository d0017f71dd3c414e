//! # Back-Office Configuration
//!
//! Configuration loaded once at startup and turned into a [`DbConfig`].
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`INAYA_*`)
//! 2. Config file (`--config PATH`, else `backoffice.toml` in the platform
//!    config dir, when present)
//! 3. Defaults (this file)
//!
//! ## Example `backoffice.toml`
//! ```toml
//! [database]
//! path = "/srv/inaya/inaya_cloth.db"
//! max_connections = 5
//! run_migrations = true
//!
//! [admin]
//! name = "Owner"
//! email = "owner@inaya.pk"
//! password = "change-me"
//! ```
//!
//! Sections and keys may be omitted; missing values keep their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use inaya_core::validation::{validate_email, validate_password, validate_required};
use inaya_db::{DbConfig, DefaultAdmin};

/// File name looked up in the platform config dir.
pub const CONFIG_FILE_NAME: &str = "backoffice.toml";

/// Database file name used when no path is configured.
pub const DEFAULT_DB_FILE: &str = "inaya_cloth.db";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("pk", "inaya", "backoffice")
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SQLite file; created on first start.
    pub path: PathBuf,

    /// Pool size. Default: 5
    pub max_connections: u32,

    /// Run the schema migrator on every start. Default: true
    pub run_migrations: bool,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let path = project_dirs()
            .map(|dirs| dirs.data_dir().join(DEFAULT_DB_FILE))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));

        DatabaseSection {
            path,
            max_connections: 5,
            run_migrations: true,
        }
    }
}

/// `[admin]` section: the account seeded when no active admin exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSection {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Default for AdminSection {
    fn default() -> Self {
        let admin = DefaultAdmin::default();
        AdminSection {
            name: admin.name,
            email: admin.email,
            password: admin.password,
        }
    }
}

// =============================================================================
// BackofficeConfig
// =============================================================================

/// Back-office configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackofficeConfig {
    pub database: DatabaseSection,
    pub admin: AdminSection,
}

impl BackofficeConfig {
    /// Loads defaults, then the config file, then environment overrides.
    ///
    /// An explicit `path` must exist; the platform default is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No config file found, using defaults");
                    BackofficeConfig::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// `backoffice.toml` in the platform config dir.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Parses a TOML file; omitted keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), "Configuration file loaded");
        Ok(config)
    }

    /// Applies `INAYA_*` overrides read through `var`.
    ///
    /// ## Variables
    /// - `INAYA_DB_PATH`: database file
    /// - `INAYA_MAX_CONNECTIONS`: pool size
    /// - `INAYA_ADMIN_EMAIL`: default admin e-mail
    /// - `INAYA_ADMIN_PASSWORD`: default admin password
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var("INAYA_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = var("INAYA_MAX_CONNECTIONS") {
            self.database.max_connections = max
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("INAYA_MAX_CONNECTIONS".to_string()))?;
        }

        if let Some(email) = var("INAYA_ADMIN_EMAIL") {
            self.admin.email = email;
        }

        if let Some(password) = var("INAYA_ADMIN_PASSWORD") {
            self.admin.password = password;
        }

        Ok(())
    }

    /// Rejects values the store cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path is empty".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
            ));
        }

        fn invalid(e: impl std::fmt::Display) -> ConfigError {
            ConfigError::Invalid(format!("admin: {}", e))
        }
        validate_required("name", &self.admin.name).map_err(invalid)?;
        validate_email(&self.admin.email).map_err(invalid)?;
        validate_password(&self.admin.password).map_err(invalid)?;

        Ok(())
    }

    /// Database configuration for [`inaya_db::Database::new`].
    ///
    /// The migrator is left to the caller so it can log the report.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .run_migrations(false)
            .admin(DefaultAdmin::new(
                self.admin.name.clone(),
                self.admin.email.clone(),
                self.admin.password.clone(),
            ))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

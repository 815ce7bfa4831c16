//! Shield Configuration
//!
//! Loaded from a TOML file; every field has a default so a partial file (or
//! no file at all) is valid.
//!
//! ```toml
//! database = "/data/hookshield/url.db"
//! log_level = "debug"
//! host_package = "com.example.app"
//! enabled_groups = ["ad_packages", "flags_init"]
//! ```

use hs_hooks::BUILTIN_GROUP_NAMES;
use hs_network::InterceptorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    /// Rule database file
    pub database: PathBuf,
    /// Default log level; `RUST_LOG` overrides it
    pub log_level: String,
    /// Package name of the host application, used in discovery keys
    pub host_package: String,
    /// Match requests against the rules at all
    pub request_filtering: bool,
    /// Upper bound on cached request decisions
    pub decision_cache_capacity: usize,
    /// Built-in hook groups to install; empty installs all of them
    pub enabled_groups: Vec<String>,
    /// Skip the original body after a before-intercept
    pub suppress_original: bool,
    /// Method inventory used by install passes
    pub inventory: Option<PathBuf>,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("hookshield.db"),
            log_level: "info".to_string(),
            host_package: "com.example.app".to_string(),
            request_filtering: true,
            decision_cache_capacity: InterceptorConfig::default().cache_capacity,
            enabled_groups: Vec::new(),
            suppress_original: true,
            inventory: None,
        }
    }
}

impl ShieldConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Interceptor settings derived from this configuration
    pub fn interceptor(&self) -> InterceptorConfig {
        InterceptorConfig {
            enabled: self.request_filtering,
            cache_capacity: self.decision_cache_capacity,
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.as_os_str().is_empty() {
            return Err(ConfigError::MissingDatabase);
        }
        if self.host_package.trim().is_empty() {
            return Err(ConfigError::MissingHostPackage);
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log_level.clone()));
        }
        if let Some(unknown) = self
            .enabled_groups
            .iter()
            .find(|name| !BUILTIN_GROUP_NAMES.contains(&name.as_str()))
        {
            return Err(ConfigError::UnknownGroup(unknown.clone()));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Database path is empty")]
    MissingDatabase,

    #[error("Host package is empty")]
    MissingHostPackage,

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Unknown hook group: {0}")]
    UnknownGroup(String),
}

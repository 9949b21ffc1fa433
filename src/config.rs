//! Settings for the table client
//!
//! Settings are selected per deployment environment and may be loaded from
//! YAML. They are built once at startup and passed to whatever constructs
//! the store client.

use crate::error::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Environment variable naming the deployment environment
pub const ENV_VAR: &str = "APP_ENV";

/// Environment variable overriding the table name
pub const TABLE_VAR: &str = "DYNAMODB_TABLE";

/// Environment variable overriding the region
pub const REGION_VAR: &str = "AWS_REGION";

// ============================================================================
// Environment
// ============================================================================

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Dev,
    Staging,
    Prod,
}

impl Environment {
    /// Parse an environment name; anything unrecognised is `Dev`
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some("staging") => Self::Staging,
            Some("prod") => Self::Prod,
            _ => Self::Dev,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
        }
    }

    /// Table used by this environment unless overridden
    pub fn default_table(self) -> String {
        format!("{}.volta", self.as_str())
    }
}

// ============================================================================
// Retries
// ============================================================================

/// Retry behaviour handed to the store client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    Legacy,
    #[default]
    Standard,
    Adaptive,
}

/// Retry settings for the store client. This crate never retries itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub mode: RetryMode,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            mode: RetryMode::default(),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}

// ============================================================================
// Settings
// ============================================================================

/// Resolved settings for one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub env: Environment,
    pub debug: bool,
    pub region: String,
    pub max_pool_connections: u32,
    pub retries: RetryConfig,
    pub table_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_environment(Environment::Dev)
    }
}

/// Settings as written in YAML; every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    #[serde(default)]
    env: Option<Environment>,
    #[serde(default)]
    debug: Option<bool>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    max_pool_connections: Option<u32>,
    #[serde(default)]
    retries: Option<RetryConfig>,
    #[serde(default)]
    table_name: Option<String>,
}

impl Settings {
    /// Defaults for an environment
    pub fn for_environment(env: Environment) -> Self {
        Self {
            env,
            debug: env != Environment::Prod,
            region: "ap-southeast-2".to_string(),
            max_pool_connections: 15,
            retries: RetryConfig::default(),
            table_name: env.default_table(),
        }
    }

    /// Select the environment from `APP_ENV`, then apply table and region
    /// overrides from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Settings::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Environment::from_name(lookup(ENV_VAR).as_deref());
        let mut settings = Self::for_environment(env);
        settings.apply_overrides(&lookup);
        info!(
            "Using {} settings (table: {})",
            settings.env.as_str(),
            settings.table_name
        );
        settings.validate()?;
        Ok(settings)
    }

    /// Parse YAML. Missing fields take the defaults of the file's `env`
    /// (or `fallback_env` when the file names none).
    pub fn from_yaml_str(yaml: &str, fallback_env: Environment) -> Result<Self> {
        let file: SettingsFile = if yaml.trim().is_empty() {
            SettingsFile::default()
        } else {
            serde_yaml::from_str(yaml)
                .map_err(|e| Error::config(format!("Failed to parse settings YAML: {e}")))?
        };

        let base = Self::for_environment(file.env.unwrap_or(fallback_env));
        let settings = Self {
            env: base.env,
            debug: file.debug.unwrap_or(base.debug),
            region: file.region.unwrap_or(base.region),
            max_pool_connections: file
                .max_pool_connections
                .unwrap_or(base.max_pool_connections),
            retries: file.retries.unwrap_or(base.retries),
            table_name: file.table_name.unwrap_or(base.table_name),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>, fallback_env: Environment) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file '{}'", path.display()))?;
        Self::from_yaml_str(&content, fallback_env)
    }

    fn apply_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(table) = lookup(TABLE_VAR).filter(|t| !t.trim().is_empty()) {
            self.table_name = table;
        }
        if let Some(region) = lookup(REGION_VAR).filter(|r| !r.trim().is_empty()) {
            self.region = region;
        }
    }

    /// Reject settings the store client cannot use
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(Error::invalid_config("table_name", "cannot be empty"));
        }
        if self.region.trim().is_empty() {
            return Err(Error::invalid_config("region", "cannot be empty"));
        }
        if self.max_pool_connections == 0 {
            return Err(Error::invalid_config(
                "max_pool_connections",
                "must be at least 1",
            ));
        }
        if self.retries.max_attempts == 0 {
            return Err(Error::invalid_config(
                "retries.max_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

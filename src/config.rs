//! Configuration loading and management.
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//!
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. `.sqlgenie.toml` in current directory
//! 4. `~/.config/sqlgenie/config.toml`
//! 5. Default values
//!
//! # Configuration File Format
//!
//! ```toml
//! [analyzer]
//! max_query_length = 100000
//! dialect = "postgresql"      # generic, mysql, postgresql, sqlite, clickhouse
//!
//! [rules]
//! enabled = ["select-star", "missing-where", "implicit-cross-join"]
//! disabled = ["or-to-in"]
//! min_severity = "warning"    # info, warning, critical
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `SQLGENIE_MIN_SEVERITY` | Lowest severity shown |
//! | `SQLGENIE_MAX_QUERY_LENGTH` | Maximum query length in characters |
//! | `SQLGENIE_RULES` | Comma-separated list of enabled rule ids |

use std::{env, fs, path::PathBuf};

use serde::Deserialize;

use crate::{
    ast::SqlDialect,
    error::{AppResult, config_error},
    rules::{Severity, parse_severity}
};

/// Default cap on query size, in characters.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 100_000;

pub const ENV_MIN_SEVERITY: &str = "SQLGENIE_MIN_SEVERITY";
pub const ENV_MAX_QUERY_LENGTH: &str = "SQLGENIE_MAX_QUERY_LENGTH";
pub const ENV_RULES: &str = "SQLGENIE_RULES";

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub rules:    RulesConfig
}

/// Input limits and parsing
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    pub max_query_length: usize,
    pub dialect:          SqlDialect
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            dialect:          SqlDialect::Generic
        }
    }
}

/// Rules configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    /// Rule ids to run; `None` runs every rule
    pub enabled:      Option<Vec<String>>,
    /// Rule ids to skip
    pub disabled:     Vec<String>,
    /// Findings below this are computed but not reported
    pub min_severity: Severity
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file in current directory (.sqlgenie.toml)
    /// 3. Config file in home directory (~/.config/sqlgenie/config.toml)
    /// 4. Default values
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(home) = env::var_os("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("sqlgenie")
                .join("config.toml");
            if home_config.exists() {
                config = Self::from_file(&home_config)?;
            }
        }

        let local_config = PathBuf::from(".sqlgenie.toml");
        if local_config.exists() {
            config = Self::from_file(&local_config)?;
        }

        config.apply_overrides(|key| env::var(key).ok())?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }

    fn from_file(path: &std::path::Path) -> AppResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            config_error(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a TOML document; missing sections take their defaults.
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Invalid config file: {}", e)))
    }

    /// Apply `SQLGENIE_*` overrides read through `lookup`.
    ///
    /// Takes the lookup as a closure so callers (and tests) decide where the
    /// variables come from.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> AppResult<()> {
        if let Some(value) = lookup(ENV_MIN_SEVERITY) {
            self.rules.min_severity = parse_severity(&value).ok_or_else(|| {
                config_error(format!("{}: unknown severity '{}'", ENV_MIN_SEVERITY, value))
            })?;
        }
        if let Some(value) = lookup(ENV_MAX_QUERY_LENGTH) {
            self.analyzer.max_query_length = value
                .trim()
                .parse()
                .ok()
                .filter(|n: &usize| *n > 0)
                .ok_or_else(|| {
                    config_error(format!(
                        "{}: expected a positive integer, got '{}'",
                        ENV_MAX_QUERY_LENGTH, value
                    ))
                })?;
        }
        if let Some(value) = lookup(ENV_RULES) {
            let rules: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
            self.rules.enabled = (!rules.is_empty()).then_some(rules);
        }
        Ok(())
    }
}

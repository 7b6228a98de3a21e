//! Composition configuration loading
//!
//! Configuration sources, highest priority first:
//! 1. Explicit path (command-line argument)
//! 2. `TRELLIS_CONFIG` environment variable
//! 3. Platform config file (`<config_dir>/trellis/config.toml`)
//! 4. Compiled defaults
//!
//! Individual fields may additionally be overridden by environment variables
//! (`TRELLIS_ACTIVATE_DURING_COMPOSITION`, `TRELLIS_VIEW_EXTENSION`) after the
//! file has been loaded.
//!
//! A missing config file is never fatal: a warning is logged and defaults are
//! used. A malformed file is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TRELLIS_CONFIG";

/// Environment override for [`CompositionConfig::activate_during_composition`]
pub const ACTIVATE_ENV_VAR: &str = "TRELLIS_ACTIVATE_DURING_COMPOSITION";

/// Environment override for [`CompositionConfig::view_extension`]
pub const VIEW_EXTENSION_ENV_VAR: &str = "TRELLIS_VIEW_EXTENSION";

/// How a compose call against a container that is already mid-composition is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    /// Wait for the in-flight composition to finish, then run
    #[default]
    Serialize,
    /// Fail immediately with a busy error
    Reject,
    /// No guard; content swaps may interleave (last transition to finish wins)
    Unguarded,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Process-wide composition configuration
///
/// Read once at startup and handed to the composer at construction time.
/// Nothing writes to it while compositions are running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionConfig {
    /// Activate models during composition when the instruction does not say otherwise
    #[serde(default)]
    pub activate_during_composition: bool,

    /// Suffix that marks a bare string instruction as a view specifier
    #[serde(default = "default_view_extension")]
    pub view_extension: String,

    /// Area used when composing a bare view with no model
    #[serde(default = "default_area")]
    pub default_area: String,

    /// Prefix turning a transition name into a module identifier
    #[serde(default = "default_transition_namespace")]
    pub transition_namespace: String,

    /// Policy for overlapping compose calls on one container
    #[serde(default)]
    pub concurrency: ConcurrencyPolicy,

    /// Upper bound on a single transition; unset means wait indefinitely
    #[serde(default)]
    pub transition_timeout_ms: Option<u64>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_view_extension() -> String {
    ".html".to_string()
}

fn default_area() -> String {
    "partial".to_string()
}

fn default_transition_namespace() -> String {
    "transitions/".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            activate_during_composition: false,
            view_extension: default_view_extension(),
            default_area: default_area(),
            transition_namespace: default_transition_namespace(),
            concurrency: ConcurrencyPolicy::default(),
            transition_timeout_ms: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl CompositionConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values that would make composition ambiguous
    pub fn validate(&self) -> Result<()> {
        if self.view_extension.is_empty() {
            return Err(Error::Config(
                "view_extension must not be empty".to_string(),
            ));
        }
        if self.default_area.is_empty() {
            return Err(Error::Config("default_area must not be empty".to_string()));
        }
        if self.transition_timeout_ms == Some(0) {
            return Err(Error::Config(
                "transition_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply per-field environment overrides on top of the loaded values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var(ACTIVATE_ENV_VAR) {
            self.activate_during_composition = parse_bool(ACTIVATE_ENV_VAR, &value)?;
        }
        if let Ok(value) = std::env::var(VIEW_EXTENSION_ENV_VAR) {
            self.view_extension = value;
        }
        self.validate()
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}

/// Platform config file location (`<config_dir>/trellis/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("trellis").join("config.toml"))
}

/// Resolve configuration following the documented priority order
///
/// An explicit path that does not exist is an error: the caller asked for it.
/// Files found through the environment or the platform location are optional.
pub fn resolve_config(cli_path: Option<&Path>) -> Result<CompositionConfig> {
    let mut config = if let Some(path) = cli_path {
        // Priority 1: Command-line argument
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        CompositionConfig::load_file(path)?
    } else if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        // Priority 2: Environment variable
        load_optional(Path::new(&path))?
    } else if let Some(path) = default_config_path().filter(|p| p.exists()) {
        // Priority 3: Platform config file
        CompositionConfig::load_file(&path)?
    } else {
        // Priority 4: Compiled defaults
        debug!("No config file found, using compiled defaults");
        CompositionConfig::default()
    };

    config.apply_env_overrides()?;
    Ok(config)
}

fn load_optional(path: &Path) -> Result<CompositionConfig> {
    if path.exists() {
        CompositionConfig::load_file(path)
    } else {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        Ok(CompositionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompositionConfig::default();
        assert!(!config.activate_during_composition);
        assert_eq!(config.view_extension, ".html");
        assert_eq!(config.default_area, "partial");
        assert_eq!(config.transition_namespace, "transitions/");
        assert_eq!(config.concurrency, ConcurrencyPolicy::Serialize);
        assert!(config.transition_timeout_ms.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = CompositionConfig::from_toml_str(
            "activate_during_composition = true\nconcurrency = \"reject\"\n",
        )
        .unwrap();
        assert!(config.activate_during_composition);
        assert_eq!(config.concurrency, ConcurrencyPolicy::Reject);
        assert_eq!(config.view_extension, ".html");
    }

    #[test]
    fn test_empty_view_extension_rejected() {
        let result = CompositionConfig::from_toml_str("view_extension = \"\"\n");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = CompositionConfig::from_toml_str("activate_during_composition = ");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "TRUE").unwrap());
        assert!(parse_bool("X", "on").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}

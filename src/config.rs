//! Configuration management for baby-emu.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Environment variables (`BABY_DELAY_MS`, etc.)
//! 2. Project-local config file (`./baby.toml`)
//! 3. Built-in defaults
//!
//! Command-line flags override all of these.
//!
//! # Config File Format
//!
//! ```toml
//! # baby.toml
//!
//! # Pause between cycles in continuous run
//! delay_ms = 50
//!
//! # Give up on programs that never execute STP
//! max_cycles = 100000
//!
//! # Assembler source conventions
//! comment_marker = ";"
//! case_sensitive = false
//! ```

use crate::asm::AsmOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Name of the project-local config file.
pub const CONFIG_FILE: &str = "baby.toml";

/// Default pause between cycles.
pub const DEFAULT_DELAY_MS: u64 = 0;

/// Default cycle limit for the CLI.
pub const DEFAULT_MAX_CYCLES: u64 = 100_000;

/// Global cached configuration.
static CONFIG: OnceLock<Config> = OnceLock::new();

/// baby-emu configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Milliseconds to wait between cycles when running continuously.
    pub delay_ms: Option<u64>,

    /// Cycle limit for runs that do not halt.
    pub max_cycles: Option<u64>,

    /// Comment character for assembly source.
    pub comment_marker: Option<char>,

    /// Require upper-case mnemonics.
    pub case_sensitive: Option<bool>,
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        match Self::load_from_file(Path::new(CONFIG_FILE)) {
            Ok(Some(local)) => config.merge(local),
            Ok(None) => {}
            Err(e) => log::warn!("{}", e),
        }

        // Environment variables override everything
        config.apply_env_overrides();

        config
    }

    /// Get the cached global configuration.
    ///
    /// Loads configuration on first call and caches it.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(|| {
            let config = Self::load();
            log::debug!("Loaded configuration: {:?}", config);
            config
        })
    }

    /// Pause between cycles, with fallback to the default.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.unwrap_or(DEFAULT_DELAY_MS))
    }

    /// Cycle limit, with fallback to the default.
    pub fn max_cycles(&self) -> u64 {
        self.max_cycles.unwrap_or(DEFAULT_MAX_CYCLES)
    }

    /// Assembler options, with fallback to the assembler defaults.
    pub fn asm_options(&self) -> AsmOptions {
        let defaults = AsmOptions::default();
        AsmOptions {
            comment_marker: self.comment_marker.unwrap_or(defaults.comment_marker),
            case_sensitive: self.case_sensitive.unwrap_or(defaults.case_sensitive),
        }
    }

    /// Load configuration from a specific file.
    ///
    /// A missing file is not an error.
    pub fn load_from_file(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;

        log::info!("Loaded config from {}", path.display());
        Ok(Some(config))
    }

    /// Parse config file contents.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: CONFIG_FILE.to_string(),
            message: e.to_string(),
        })
    }

    /// Merge another config into this one.
    /// Only overrides fields that are Some in the other config.
    fn merge(&mut self, other: Self) {
        if other.delay_ms.is_some() {
            self.delay_ms = other.delay_ms;
        }
        if other.max_cycles.is_some() {
            self.max_cycles = other.max_cycles;
        }
        if other.comment_marker.is_some() {
            self.comment_marker = other.comment_marker;
        }
        if other.case_sensitive.is_some() {
            self.case_sensitive = other.case_sensitive;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.merge(Self::from_env(|key| std::env::var(key).ok()));
    }

    /// Read overrides through `lookup`; unparseable values are skipped.
    fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup("BABY_DELAY_MS") {
            match value.parse() {
                Ok(ms) => {
                    log::info!("Using BABY_DELAY_MS from environment: {}", ms);
                    config.delay_ms = Some(ms);
                }
                Err(_) => log::warn!("Ignoring invalid BABY_DELAY_MS: {}", value),
            }
        }
        if let Some(value) = lookup("BABY_MAX_CYCLES") {
            match value.parse() {
                Ok(n) => {
                    log::info!("Using BABY_MAX_CYCLES from environment: {}", n);
                    config.max_cycles = Some(n);
                }
                Err(_) => log::warn!("Ignoring invalid BABY_MAX_CYCLES: {}", value),
            }
        }
        if let Some(value) = lookup("BABY_COMMENT_MARKER") {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => config.comment_marker = Some(c),
                _ => log::warn!("Ignoring invalid BABY_COMMENT_MARKER: {:?}", value),
            }
        }
        if let Some(value) = lookup("BABY_CASE_SENSITIVE") {
            match value.parse() {
                Ok(flag) => config.case_sensitive = Some(flag),
                Err(_) => log::warn!("Ignoring invalid BABY_CASE_SENSITIVE: {}", value),
            }
        }

        config
    }

    /// Generate a sample config file content.
    pub fn sample_config() -> String {
        r#"# baby-emu configuration
# Place this file at ./baby.toml

# Milliseconds to wait between cycles in continuous run
delay_ms = 0

# Stop runs that never reach STP after this many cycles
max_cycles = 100000

# Assembly source conventions
comment_marker = ";"
case_sensitive = false
"#
        .to_string()
    }
}

/// Errors that can occur while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.delay(), Duration::ZERO);
        assert_eq!(config.max_cycles(), DEFAULT_MAX_CYCLES);
        assert_eq!(config.asm_options(), AsmOptions::default());
    }

    #[test]
    fn test_sample_config_parses() {
        let config = Config::parse(&Config::sample_config()).unwrap();
        assert_eq!(config.delay_ms, Some(0));
        assert_eq!(config.max_cycles, Some(100_000));
        assert_eq!(config.comment_marker, Some(';'));
        assert_eq!(config.case_sensitive, Some(false));
    }

    #[test]
    fn test_partial_file_and_merge() {
        let mut config = Config::parse("delay_ms = 250\n").unwrap();
        assert_eq!(config.delay(), Duration::from_millis(250));
        assert_eq!(config.max_cycles, None);

        config.merge(Config::parse("max_cycles = 10\ncomment_marker = \"#\"").unwrap());
        assert_eq!(config.delay_ms, Some(250));
        assert_eq!(config.max_cycles(), 10);
        assert_eq!(config.asm_options().comment_marker, '#');
    }

    #[test]
    fn test_bad_file() {
        assert!(matches!(
            Config::parse("delay_ms = \"soon\""),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BABY_DELAY_MS", "20"),
            ("BABY_MAX_CYCLES", "lots"),
            ("BABY_COMMENT_MARKER", "--"),
            ("BABY_CASE_SENSITIVE", "true"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_env(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.delay_ms, Some(20));
        assert_eq!(config.max_cycles, None);
        assert_eq!(config.comment_marker, None);
        assert_eq!(config.case_sensitive, Some(true));
    }
}

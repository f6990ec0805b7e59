//! Configuration for the relay.
//!
//! Two sources feed the relay:
//! - [`RelayConfig`]: what the generator reports about itself, read from its
//!   own config file (see [`generator`])
//! - [`RelaySettings`]: relay-local knobs, from an optional TOML file
//!   (`~/.config/statusrelay/config.toml` by default) overridden by CLI flags

pub mod generator;

pub use generator::{
    ConfigValue, RelayConfig, DEFAULT_GENERATOR_CONFIG, DEFAULT_TIME_FORMAT,
    EXPECTED_OUTPUT_FORMAT,
};

use crate::cli::Cli;
use crate::error::{RelayError, Result};
use crate::plugins::engine::DEFAULT_CACHE_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TICK_INTERVAL: u64 = 1;
pub const DEFAULT_PLUGIN_TIMEOUT: u64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Generator config passed as `-c` and read into [`RelayConfig`]
    pub generator_config: PathBuf,
    pub disable_transform: bool,
    pub plugin_dir: PathBuf,
    /// Seconds between bar updates
    pub tick_interval: u64,
    /// Default plugin result TTL in seconds
    pub cache_timeout: u64,
    /// Generator program; `i3status` from PATH when unset
    pub generator: Option<PathBuf>,
    pub plugin_timeout: u64,
    pub strict_validation: bool,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            generator_config: PathBuf::from(DEFAULT_GENERATOR_CONFIG),
            disable_transform: false,
            plugin_dir: default_plugin_dir(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            generator: None,
            plugin_timeout: DEFAULT_PLUGIN_TIMEOUT,
            strict_validation: true,
            log_file: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

fn default_plugin_dir() -> PathBuf {
    let relative = Path::new(".i3").join("py3status");
    match dirs::home_dir() {
        Some(home) => home.join(relative),
        None => relative,
    }
}

impl RelaySettings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("statusrelay").join("config.toml"))
    }

    /// Load the settings file, if any
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        let content = fs::read_to_string(&path).map_err(|e| {
            RelayError::Settings(format!("cannot read {}: {}", path.display(), e))
        })?;
        let settings: Self = toml::from_str(&content)
            .map_err(|e| RelayError::Settings(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("loaded relay settings from {}", path.display());
        Ok(settings)
    }

    /// Settings file plus CLI overrides, validated
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut settings = Self::load(cli.settings.as_deref())?;
        settings.apply_cli(cli);
        settings.check()?;
        Ok(settings)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(path) = &cli.generator_config {
            self.generator_config = path.clone();
        }
        if cli.disable_transform {
            self.disable_transform = true;
        }
        if let Some(dir) = &cli.plugin_dir {
            self.plugin_dir = dir.clone();
        }
        if let Some(interval) = cli.interval {
            self.tick_interval = interval;
        }
        if let Some(timeout) = cli.cache_timeout {
            self.cache_timeout = timeout;
        }
        if let Some(generator) = &cli.generator {
            self.generator = Some(generator.clone());
        }
        if let Some(timeout) = cli.plugin_timeout {
            self.plugin_timeout = timeout;
        }
        if cli.permissive_plugins {
            self.strict_validation = false;
        }
        if let Some(path) = &cli.log_file {
            self.log_file = Some(path.clone());
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.tick_interval == 0 {
            return Err(RelayError::Settings("tick_interval must be at least 1".into()));
        }
        if self.plugin_timeout == 0 {
            return Err(RelayError::Settings("plugin_timeout must be at least 1".into()));
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_interval)
    }

    pub fn plugin_timeout(&self) -> Duration {
        Duration::from_secs(self.plugin_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = RelaySettings::default();
        assert_eq!(settings.tick_interval, 1);
        assert_eq!(settings.cache_timeout, 60);
        assert_eq!(settings.generator_config, PathBuf::from("/etc/i3status.conf"));
        assert!(settings.plugin_dir.ends_with(".i3/py3status"));
        assert!(settings.strict_validation);
        assert!(settings.check().is_ok());
    }

    #[test]
    fn test_file_then_cli_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "tick_interval = 3\ncache_timeout = 120\nstrict_validation = false\nlog_level = \"debug\""
        )
        .unwrap();

        let cli = Cli {
            settings: Some(file.path().to_path_buf()),
            interval: Some(2),
            disable_transform: true,
            ..Default::default()
        };
        let settings = RelaySettings::resolve(&cli).unwrap();
        assert_eq!(settings.tick_interval, 2);
        assert_eq!(settings.cache_timeout, 120);
        assert!(settings.disable_transform);
        assert!(!settings.strict_validation);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.plugin_timeout, DEFAULT_PLUGIN_TIMEOUT);
    }

    #[test]
    fn test_missing_explicit_file_is_an_init_error() {
        let cli = Cli {
            settings: Some(PathBuf::from("/nonexistent/statusrelay.toml")),
            ..Default::default()
        };
        let err = RelaySettings::resolve(&cli).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_bad_toml_is_an_init_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tick_interval = \"soon\"").unwrap();
        let err = RelaySettings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, RelayError::Settings(_)));
    }

    #[test]
    fn test_zero_tick_rejected() {
        let settings = RelaySettings {
            tick_interval: 0,
            ..Default::default()
        };
        assert!(settings.check().is_err());
    }
}

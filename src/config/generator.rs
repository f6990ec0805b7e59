//! Reader for the generator's own configuration file.
//!
//! Only the `general { … }` block and the `time { … }` block matter to the
//! relay. Values are parsed by a small typed parser instead of being
//! evaluated, so anything that is not a boolean, an integer or a quoted
//! string is rejected for the keys we care about.

use crate::error::{RelayError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// The only output format the relay speaks
pub const EXPECTED_OUTPUT_FORMAT: &str = "i3bar";

pub const DEFAULT_GENERATOR_CONFIG: &str = "/etc/i3status.conf";
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_GENERATOR_INTERVAL: u64 = 5;

/// Settings the generator reports about itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub colors: bool,
    pub color_good: Option<String>,
    pub color_bad: Option<String>,
    pub color_degraded: Option<String>,
    pub color_separator: Option<String>,
    /// Generator refresh period in seconds
    pub interval: u64,
    pub output_format: Option<String>,
    pub time_format: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            colors: false,
            color_good: None,
            color_bad: None,
            color_degraded: None,
            color_separator: None,
            interval: DEFAULT_GENERATOR_INTERVAL,
            output_format: None,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

/// A right-hand side of `key = value`
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl ConfigValue {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        match raw {
            "true" => return Some(ConfigValue::Bool(true)),
            "false" => return Some(ConfigValue::Bool(false)),
            _ => {}
        }
        if let Ok(n) = raw.parse::<i64>() {
            return Some(ConfigValue::Integer(n));
        }
        for quote in ['"', '\''] {
            if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
                return Some(ConfigValue::Text(raw[1..raw.len() - 1].to_string()));
            }
        }
        None
    }

    fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Bool(_) => "boolean",
            ConfigValue::Integer(_) => "integer",
            ConfigValue::Text(_) => "string",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Block {
    Other,
    General,
    Time,
}

fn assignment_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*)$").ok())
        .as_ref()
}

impl RelayConfig {
    /// Read and parse the generator config at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| RelayError::generator_config(path, e.to_string()))?;
        Self::parse(&content).map_err(|message| RelayError::generator_config(path, message))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut config = Self::default();
        let mut block = Block::Other;

        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.starts_with("general") {
                block = Block::General;
            } else if line.starts_with("time") {
                block = Block::Time;
            } else if line.starts_with('}') {
                block = Block::Other;
            }
            if block == Block::Other || !line.contains('=') {
                continue;
            }

            let Some(caps) = assignment_pattern().and_then(|re| re.captures(line)) else {
                continue;
            };
            let key = match block {
                Block::Time => format!("time_{}", &caps[1]),
                _ => caps[1].to_string(),
            };
            if !config.knows(&key) {
                continue;
            }
            let value = ConfigValue::parse(&caps[2]).ok_or_else(|| {
                format!("line {}: cannot parse value for '{}'", lineno + 1, key)
            })?;
            config
                .set(&key, value)
                .map_err(|e| format!("line {}: {}", lineno + 1, e))?;
        }

        Ok(config)
    }

    /// The relay only understands the i3bar protocol
    pub fn ensure_i3bar(&self) -> std::result::Result<(), String> {
        match self.output_format.as_deref() {
            Some(EXPECTED_OUTPUT_FORMAT) => Ok(()),
            other => Err(format!(
                "output_format should be set to \"{}\" (found {:?})",
                EXPECTED_OUTPUT_FORMAT, other
            )),
        }
    }

    fn knows(&self, key: &str) -> bool {
        matches!(
            key,
            "colors"
                | "color_good"
                | "color_bad"
                | "color_degraded"
                | "color_separator"
                | "interval"
                | "output_format"
                | "time_format"
        )
    }

    fn set(&mut self, key: &str, value: ConfigValue) -> std::result::Result<(), String> {
        let mismatch = |expected: &str, value: &ConfigValue| {
            format!("'{}' expects a {}, got a {}", key, expected, value.kind())
        };
        match (key, value) {
            ("colors", ConfigValue::Bool(b)) => self.colors = b,
            ("interval", ConfigValue::Integer(n)) if n > 0 => self.interval = n as u64,
            ("interval", ConfigValue::Integer(n)) => {
                return Err(format!("'interval' must be positive, got {}", n))
            }
            ("output_format", ConfigValue::Text(s)) => self.output_format = Some(s),
            ("time_format", ConfigValue::Text(s)) => self.time_format = s,
            ("color_good", ConfigValue::Text(s)) => self.color_good = Some(s),
            ("color_bad", ConfigValue::Text(s)) => self.color_bad = Some(s),
            ("color_degraded", ConfigValue::Text(s)) => self.color_degraded = Some(s),
            ("color_separator", ConfigValue::Text(s)) => self.color_separator = Some(s),
            ("colors", other) => return Err(mismatch("boolean", &other)),
            ("interval", other) => return Err(mismatch("integer", &other)),
            (_, other) => return Err(mismatch("string", &other)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r##"
# i3status configuration file.
general {
        output_format = "i3bar"
        colors = true
        interval = 5
        color_good = "#00FF00"
}

order += "wireless _first_"
order += "time"

wireless _first_ {
        format_up = "W: (%quality at %essid) %ip"
}

time {
        format = "%H:%M:%S"
}
"##;

    #[test]
    fn test_parse_sample() {
        let config = RelayConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.output_format.as_deref(), Some("i3bar"));
        assert!(config.colors);
        assert_eq!(config.interval, 5);
        assert_eq!(config.color_good.as_deref(), Some("#00FF00"));
        assert_eq!(config.time_format, "%H:%M:%S");
        assert!(config.ensure_i3bar().is_ok());
    }

    #[test]
    fn test_defaults_when_blocks_are_missing() {
        let config = RelayConfig::parse("order += \"load\"\n").unwrap();
        assert_eq!(config, RelayConfig::default());
        assert!(config.ensure_i3bar().is_err());
    }

    #[test]
    fn test_wrong_output_format() {
        let config = RelayConfig::parse("general {\n output_format = \"dzen2\"\n}\n").unwrap();
        let err = config.ensure_i3bar().unwrap_err();
        assert!(err.contains("i3bar"));
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let err = RelayConfig::parse("general {\n interval = \"five\"\n}\n").unwrap_err();
        assert!(err.contains("interval"));
        let err = RelayConfig::parse("general {\n interval = five\n}\n").unwrap_err();
        assert!(err.contains("cannot parse"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config = RelayConfig::parse("general {\n markup = pango\n}\n").unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_config_value_forms() {
        assert_eq!(ConfigValue::parse("true"), Some(ConfigValue::Bool(true)));
        assert_eq!(ConfigValue::parse(" 42 "), Some(ConfigValue::Integer(42)));
        assert_eq!(
            ConfigValue::parse("'%H:%M'"),
            Some(ConfigValue::Text("%H:%M".into()))
        );
        assert_eq!(ConfigValue::parse("\""), None);
        assert_eq!(ConfigValue::parse("bare"), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = RelayConfig::load(file.path()).unwrap();
        assert_eq!(config.interval, 5);

        let err = RelayConfig::load(Path::new("/nonexistent/i3status.conf")).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}

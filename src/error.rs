//! Error handling for statusrelay
//!
//! Every failure the relay can surface to `main` is a [`RelayError`]. Each
//! variant knows which process exit code it maps to, so bootstrap code only
//! has to propagate with `?` and call [`RelayError::exit_code`] at the end.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// Bad CLI arguments or relay settings
    #[error("Settings error: {0}")]
    Settings(String),

    /// The generator's configuration could not be read or is unusable
    #[error("Generator config error in {path}: {message}")]
    GeneratorConfig { path: PathBuf, message: String },

    /// The generator binary could not be located or spawned
    #[error("Generator spawn error: {0}")]
    Spawn(String),

    /// Signal handlers could not be installed
    #[error("Signal setup error: {0}")]
    Signal(String),

    /// A line from the generator could not be decoded
    #[error("Malformed protocol line ({source}): {line}")]
    Protocol {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// A plugin method failed or returned something unusable
    #[error("Plugin error in {method}: {message}")]
    Plugin { method: String, message: String },

    /// The consumer closed our stdout
    #[error("Output stream closed by consumer")]
    OutputClosed,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RelayError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RelayError::Settings(_)
            | RelayError::GeneratorConfig { .. }
            | RelayError::Spawn(_)
            | RelayError::Signal(_) => 1,
            RelayError::OutputClosed => 3,
            RelayError::Protocol { .. }
            | RelayError::Plugin { .. }
            | RelayError::Io(_)
            | RelayError::Serialization(_) => 2,
        }
    }

    pub fn plugin(method: impl Into<String>, message: impl Into<String>) -> Self {
        RelayError::Plugin {
            method: method.into(),
            message: message.into(),
        }
    }

    pub fn generator_config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        RelayError::GeneratorConfig {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Write failures on a closed pipe are the consumer going away, not a relay bug
    pub fn from_write(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::BrokenPipe {
            RelayError::OutputClosed
        } else {
            RelayError::Io(err)
        }
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(RelayError::Settings("bad".into()).exit_code(), 1);
        assert_eq!(
            RelayError::generator_config("/etc/i3status.conf", "missing").exit_code(),
            1
        );
        assert_eq!(RelayError::Spawn("nope".into()).exit_code(), 1);
        assert_eq!(RelayError::Signal("nope".into()).exit_code(), 1);
        assert_eq!(RelayError::OutputClosed.exit_code(), 3);
        assert_eq!(RelayError::plugin("battery", "boom").exit_code(), 2);

        let decode = serde_json::from_str::<serde_json::Value>("[{").unwrap_err();
        let err = RelayError::Protocol {
            line: "[{".into(),
            source: decode,
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_broken_pipe_maps_to_output_closed() {
        let err = RelayError::from_write(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(matches!(err, RelayError::OutputClosed));

        let err = RelayError::from_write(std::io::Error::from(std::io::ErrorKind::Other));
        assert!(matches!(err, RelayError::Io(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RelayError::plugin("battery", "exit status 1");
        assert_eq!(err.to_string(), "Plugin error in battery: exit status 1");
    }
}

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A single rejected setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted key of the setting, e.g. `session.max_memory_read`.
    pub field: &'static str,
    /// What is wrong with the value.
    pub message: String,
}

impl Violation {
    pub(crate) fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Failure to produce a [`Config`](crate::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A layer is not valid TOML or does not match the config schema.
    #[error("{origin}: {message}")]
    Parse {
        /// File path, or a label for in-memory input.
        origin: String,
        message: String,
    },

    /// The merged configuration has out-of-range settings.
    #[error("invalid configuration: {}", join(.0))]
    Invalid(Vec<Violation>),
}

impl ConfigError {
    pub(crate) fn parse(origin: impl Into<String>, err: impl fmt::Display) -> Self {
        ConfigError::Parse {
            origin: origin.into(),
            message: err.to_string(),
        }
    }

    /// Rejected settings, empty unless this is [`ConfigError::Invalid`].
    pub fn violations(&self) -> &[Violation] {
        match self {
            ConfigError::Invalid(v) => v,
            _ => &[],
        }
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log verbosity level.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Most verbose; includes every protocol round-trip.
    Trace,
    /// Debug messages.
    Debug,
    /// Informational messages (default).
    #[default]
    Info,
    /// Warnings only.
    Warn,
    /// Errors only.
    Error,
}

impl LogLevel {
    /// Name of the level as understood by `tracing` filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log verbosity level.
    #[serde(default)]
    pub level: LogLevel,
    /// Optional path to a log file. Logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
        }
    }
}

/// Settings that shape a debug session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lines shown above and below the current line by `show_line`.
    #[serde(default = "default_context_lines")]
    pub source_context_lines: usize,
    /// Largest guest memory slice a single variable dump may read, in bytes.
    #[serde(default = "default_max_memory_read")]
    pub max_memory_read: usize,
    /// Directories searched for relative source paths from debug info.
    #[serde(default)]
    pub source_roots: Vec<PathBuf>,
    /// Thread id reported with `stopped` notifications.
    #[serde(default = "default_thread_id")]
    pub thread_id: i64,
}

fn default_context_lines() -> usize {
    10
}

fn default_max_memory_read() -> usize {
    64 * 1024
}

fn default_thread_id() -> i64 {
    1
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source_context_lines: default_context_lines(),
            max_memory_read: default_max_memory_read(),
            source_roots: Vec::new(),
            thread_id: default_thread_id(),
        }
    }
}

/// Top-level wasmdbg configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
    /// Session behaviour.
    #[serde(default)]
    pub session: SessionConfig,
}

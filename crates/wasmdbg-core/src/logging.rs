//! Logging setup for hosts embedding a debug session.
//!
//! Provides log-file rotation, default path resolution, level conversion and
//! a `tracing-subscriber` initializer driven by [`LogConfig`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use wasmdbg_config::LogConfig;

/// Maximum size of a single log file before rotation (10 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum number of rotated log files to retain.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

/// Return the platform-specific default log file path.
///
/// * macOS: `$HOME/Library/Logs/wasmdbg/wasmdbg.log`
/// * Linux: `$XDG_STATE_HOME/wasmdbg/wasmdbg.log`, else
///   `$HOME/.local/state/wasmdbg/wasmdbg.log`
/// * Fallback: `<tmp>/wasmdbg/wasmdbg.log`
pub fn default_log_file_path() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Logs/wasmdbg/wasmdbg.log");
        }
    }
    #[cfg(target_os = "linux")]
    {
        if let Some(state) = std::env::var_os("XDG_STATE_HOME") {
            return PathBuf::from(state).join("wasmdbg/wasmdbg.log");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".local/state/wasmdbg/wasmdbg.log");
        }
    }
    std::env::temp_dir().join("wasmdbg").join("wasmdbg.log")
}

/// Create the parent directory of a log file if it does not exist.
pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Rotate `log_path` once it reaches `max_size` bytes.
///
/// ```text
///   wasmdbg.log   -> wasmdbg.log.1
///   wasmdbg.log.1 -> wasmdbg.log.2
///   ...
///   wasmdbg.log.<max_files> is deleted
/// ```
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if size < max_size || max_files == 0 {
        return Ok(());
    }

    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for i in (1..max_files).rev() {
        let from = rotated_path(log_path, i);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, i + 1))?;
        }
    }
    fs::rename(log_path, rotated_path(log_path, 1))
}

/// Filter used when `RUST_LOG` is unset.
fn configured_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::new(config.level.as_str())
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` overrides the configured level. Output goes to the
/// configured file (rotated first, ANSI off) or to stderr.
pub fn init_tracing(config: &LogConfig) -> io::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| configured_filter(config));

    let installed = match &config.file {
        Some(path) => {
            ensure_log_dir(path)?;
            rotate_log_files(path, DEFAULT_MAX_LOG_SIZE, DEFAULT_MAX_LOG_FILES)?;
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_env_filter(filter)
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(filter)
            .try_init(),
    };
    installed.map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let name = base.file_name().unwrap_or_default().to_string_lossy();
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{name}.{index}"))
}

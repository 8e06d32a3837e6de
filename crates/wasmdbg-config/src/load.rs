use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::{resolve, Layer};
use crate::validate::validate;

/// Per-project configuration directory, relative to the project root.
pub const PROJECT_CONFIG_DIR: &str = ".wasmdbg";

/// File name used in both the user and the project directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Where configuration layers are read from.
///
/// Precedence, lowest first: built-in defaults, the user file, then the
/// project file. Missing files are skipped; nothing is created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSources {
    /// User-wide config file.
    pub user_file: Option<PathBuf>,
    /// Project root; `<root>/.wasmdbg/config.toml` is read.
    pub project_dir: Option<PathBuf>,
}

impl ConfigSources {
    /// The user's config file plus the project at `project_dir`.
    pub fn for_project(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_file: default_user_config_path(),
            project_dir: Some(project_dir.into()),
        }
    }

    /// Candidate files with the directory their relative paths resolve
    /// against, lowest precedence first.
    pub fn files(&self) -> Vec<(PathBuf, PathBuf)> {
        let mut files = Vec::new();
        if let Some(user) = &self.user_file {
            let anchor = user.parent().map(Path::to_path_buf).unwrap_or_default();
            files.push((user.clone(), anchor));
        }
        if let Some(root) = &self.project_dir {
            files.push((
                root.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE_NAME),
                root.clone(),
            ));
        }
        files
    }
}

/// `$XDG_CONFIG_HOME/wasmdbg/config.toml`, falling back to
/// `$HOME/.config/wasmdbg/config.toml`.
pub fn default_user_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("wasmdbg").join(CONFIG_FILE_NAME))
}

/// Read every existing layer in `sources`, merge them over the defaults
/// and validate the result.
///
/// # Errors
///
/// [`ConfigError::Read`] when a file exists but cannot be read,
/// [`ConfigError::Parse`] for bad TOML or mistyped values, and
/// [`ConfigError::Invalid`] for out-of-range settings.
pub fn load_config(sources: &ConfigSources) -> Result<Config, ConfigError> {
    let mut layers = Vec::new();
    for (path, anchor) in sources.files() {
        let Some(text) = read_if_present(&path)? else {
            debug!(path = %path.display(), "no config file");
            continue;
        };
        debug!(path = %path.display(), "loading config layer");
        let origin = path.display().to_string();
        layers.push(Layer::parse(origin, &text, Some(&anchor))?);
    }
    checked(resolve(layers)?)
}

fn read_if_present(path: &Path) -> Result<Option<String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn checked(config: Config) -> Result<Config, ConfigError> {
    let violations = validate(&config);
    if violations.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::Invalid(violations))
    }
}

/// Parse a single in-memory TOML document over the defaults and validate
/// it. Relative paths are kept as written.
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let layer = Layer::parse("<inline>", toml_str, None)?;
    checked(resolve(vec![layer])?)
}

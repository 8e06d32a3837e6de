//! wasmdbg-config: layered TOML configuration for the wasmdbg debugger.
pub mod config;
pub mod error;
pub mod load;
pub mod merge;
pub mod validate;

pub use config::{Config, LogConfig, LogLevel, SessionConfig};
pub use error::{ConfigError, Violation};
pub use load::{default_user_config_path, load_config, load_from_str, ConfigSources};

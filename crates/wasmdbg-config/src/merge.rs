//! Layered configuration tables.
//!
//! Every source is parsed into a [`Layer`]. Layers are folded bottom-up
//! with [`overlay`] and the result is deserialized once, so a layer only
//! has to mention the keys it changes.

use std::path::Path;

use toml::{Table, Value};

use crate::config::Config;
use crate::error::ConfigError;

/// One parsed configuration source.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// File path or label, used in error messages.
    pub origin: String,
    pub table: Table,
}

impl Layer {
    /// Parse `text`. Relative `session.source_roots` entries and a relative
    /// `log.file` are resolved against `anchor` when one is given.
    pub fn parse(
        origin: impl Into<String>,
        text: &str,
        anchor: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let origin = origin.into();
        let mut table: Table =
            toml::from_str(text).map_err(|e| ConfigError::parse(origin.as_str(), e))?;
        if let Some(dir) = anchor {
            anchor_paths(&mut table, dir);
        }
        Ok(Self { origin, table })
    }
}

fn anchor_paths(table: &mut Table, dir: &Path) {
    if let Some(Value::Table(session)) = table.get_mut("session") {
        if let Some(Value::Array(roots)) = session.get_mut("source_roots") {
            roots.iter_mut().for_each(|root| anchor(root, dir));
        }
    }
    if let Some(Value::Table(log)) = table.get_mut("log") {
        if let Some(file) = log.get_mut("file") {
            anchor(file, dir);
        }
    }
}

fn anchor(value: &mut Value, dir: &Path) {
    let Value::String(text) = value else {
        return;
    };
    // Empty entries are left for validation to report.
    if text.is_empty() || Path::new(text.as_str()).is_absolute() {
        return;
    }
    let joined = dir.join(text.as_str()).to_string_lossy().into_owned();
    *text = joined;
}

/// Fold `upper` into `lower`. Nested tables merge key by key; any other
/// value in `upper`, arrays included, replaces the one below it.
pub fn overlay(lower: &mut Table, upper: Table) {
    for (key, value) in upper {
        match value {
            Value::Table(above) => match lower.get_mut(&key) {
                Some(Value::Table(below)) => overlay(below, above),
                _ => {
                    lower.insert(key, Value::Table(above));
                }
            },
            value => {
                lower.insert(key, value);
            }
        }
    }
}

/// Fold `layers` (lowest precedence first) over the defaults.
pub fn resolve(layers: Vec<Layer>) -> Result<Config, ConfigError> {
    let mut merged = Table::new();
    let mut origins = Vec::with_capacity(layers.len());
    for layer in layers {
        overlay(&mut merged, layer.table);
        origins.push(layer.origin);
    }
    Value::Table(merged).try_into::<Config>().map_err(|e| {
        let origin = if origins.is_empty() {
            "defaults".to_string()
        } else {
            origins.join(" + ")
        };
        ConfigError::parse(origin, e)
    })
}

//! User settings shared by every gamebox frontend.
//!
//! The settings file is always `~/.config/gamebox/settings.toml`. Values are
//! resolved in priority order: command-line flag, settings file, built-in
//! default.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Keys understood in `settings.toml`, as `table.key`.
pub const SETTING_KEYS: &[&str] = &[
    "catalogue.path",
    "import.destination",
    "import.copy_files",
    "import.fallback",
];

#[derive(Debug, Error)]
pub enum SettingsError {
    /// Reading or writing the settings file failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The settings file is not valid TOML
    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings could not be serialized
    #[error("Could not write settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Key is not one of [`SETTING_KEYS`]
    #[error("Unknown setting '{0}'")]
    UnknownKey(String),

    /// A value of the wrong type for its key
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl SettingsError {
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Canonical path to the settings file: `~/.config/gamebox/settings.toml`.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("gamebox").join("settings.toml")
}

/// Settings as stored on disk, with defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Catalogue document to load instead of the built-in one.
    pub catalogue_path: Option<PathBuf>,
    /// Default destination folder for imports.
    pub import_destination: Option<PathBuf>,
    pub copy_files: bool,
    pub fallback: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalogue_path: None,
            import_destination: None,
            copy_files: true,
            fallback: true,
        }
    }
}

impl Settings {
    /// Load from [`settings_path`]. A missing file gives the defaults.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&settings_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let doc: toml::Value = contents.parse()?;
        Ok(Self::from_value(&doc))
    }

    fn from_value(doc: &toml::Value) -> Self {
        let defaults = Self::default();
        let path = |key: &str| {
            lookup(doc, key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        };
        let flag = |key: &str, default: bool| {
            lookup(doc, key)
                .and_then(|v| v.as_bool())
                .unwrap_or(default)
        };
        Self {
            catalogue_path: path("catalogue.path"),
            import_destination: path("import.destination"),
            copy_files: flag("import.copy_files", defaults.copy_files),
            fallback: flag("import.fallback", defaults.fallback),
        }
    }

    /// The import destination: CLI override, then settings, then the
    /// current directory.
    pub fn resolve_destination(&self, cli_override: Option<PathBuf>) -> PathBuf {
        if let Some(p) = cli_override {
            return p;
        }
        if let Some(p) = &self.import_destination {
            return p.clone();
        }
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// The catalogue to load, if not the built-in one.
    pub fn resolve_catalogue_path(&self, cli_override: Option<PathBuf>) -> Option<PathBuf> {
        cli_override.or_else(|| self.catalogue_path.clone())
    }
}

fn lookup<'a>(doc: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    let (table, field) = key.split_once('.')?;
    doc.get(table)?.get(field)
}

/// Save (or clear, with `None`) one setting in `settings.toml`.
pub fn save_setting(key: &str, value: Option<&str>) -> Result<(), SettingsError> {
    save_setting_at(&settings_path(), key, value)
}

/// Save (or clear) one setting in the settings file at `path`.
///
/// Uses `toml::Value` for a surgical update so unrelated tables and keys are
/// preserved. The file is replaced atomically.
pub fn save_setting_at(path: &Path, key: &str, value: Option<&str>) -> Result<(), SettingsError> {
    if !SETTING_KEYS.contains(&key) {
        return Err(SettingsError::UnknownKey(key.to_string()));
    }
    let (table_name, field) = key
        .split_once('.')
        .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
    let value = value.map(|v| typed_value(key, v)).transpose()?;

    let mut doc: toml::Value = match std::fs::read_to_string(path) {
        Ok(contents) => contents.parse()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => toml::Value::Table(Default::default()),
        Err(e) => return Err(e.into()),
    };

    let root = doc
        .as_table_mut()
        .ok_or_else(|| SettingsError::other("settings.toml root is not a table"))?;
    let table = root
        .entry(table_name)
        .or_insert_with(|| toml::Value::Table(Default::default()))
        .as_table_mut()
        .ok_or_else(|| SettingsError::other(format!("[{}] is not a table", table_name)))?;

    match value {
        Some(v) => {
            table.insert(field.to_string(), v);
        }
        None => {
            table.remove(field);
        }
    }
    log::debug!("Updating {} in {}", key, path.display());

    // Write atomically
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(&doc)?;
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, &serialized)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn typed_value(key: &str, raw: &str) -> Result<toml::Value, SettingsError> {
    match key {
        "import.copy_files" | "import.fallback" => match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(toml::Value::Boolean(true)),
            "false" | "no" | "off" | "0" => Ok(toml::Value::Boolean(false)),
            _ => Err(SettingsError::InvalidValue {
                key: key.to_string(),
                message: format!("expected true or false, got '{}'", raw),
            }),
        },
        _ => Ok(toml::Value::String(raw.to_string())),
    }
}

/// Load the full settings file as a pretty-printed TOML string for display.
pub fn load_settings_string() -> Option<String> {
    load_settings_string_at(&settings_path())
}

pub fn load_settings_string_at(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let doc: toml::Value = contents.parse().ok()?;
    toml::to_string_pretty(&doc).ok()
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;

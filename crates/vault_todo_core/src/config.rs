//! User settings persisted as JSON next to the vault data.
//!
//! Missing fields take their defaults, so settings files written by older
//! versions keep loading.

use crate::model::value::Priority;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::Path;

pub const DEFAULT_DATA_FILE: &str = "Todos/todos.md";

/// Ordering applied by `TodoService::sort_todos`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    /// Ascending, records without a due date last.
    #[default]
    DueDate,
    /// Highest first.
    Priority,
    /// Newest first.
    CreatedAt,
    /// Case-insensitive ascending.
    Title,
}

impl SortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DueDate => "dueDate",
            Self::Priority => "priority",
            Self::CreatedAt => "createdAt",
            Self::Title => "title",
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "dueDate" | "due" => Ok(Self::DueDate),
            "priority" => Ok(Self::Priority),
            "createdAt" | "created" => Ok(Self::CreatedAt),
            "title" => Ok(Self::Title),
            other => Err(SettingsError::InvalidValue {
                key: "sortBy",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TodoSettings {
    pub default_priority: Priority,
    pub show_completed: bool,
    pub sort_by: SortKey,
    pub auto_refresh: bool,
    /// Vault-relative path of the to-do document.
    pub data_file: String,
    /// Overrides the build-mode default log level when set.
    pub log_level: Option<String>,
}

impl Default for TodoSettings {
    fn default() -> Self {
        Self {
            default_priority: Priority::Medium,
            show_completed: true,
            sort_by: SortKey::DueDate,
            auto_refresh: true,
            data_file: DEFAULT_DATA_FILE.to_string(),
            log_level: None,
        }
    }
}

impl TodoSettings {
    /// Reads settings from `path`; a missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    "event=settings_load module=config status=ok source=default path={}",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(err) => return Err(SettingsError::Io(err)),
        };
        let settings: Self = serde_json::from_str(&content)?;
        info!(
            "event=settings_load module=config status=ok source=file path={}",
            path.display()
        );
        Ok(settings)
    }

    /// Writes pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }
}

#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Json(serde_json::Error),
    InvalidValue { key: &'static str, value: String },
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "settings i/o failed: {err}"),
            Self::Json(err) => write!(f, "settings are not valid JSON: {err}"),
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for setting `{key}`")
            }
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<std::io::Error> for SettingsError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

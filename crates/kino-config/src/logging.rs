//! Model of the structured logging configuration (`logging.json`).
//!
//! The file is read as JSON, then environment variables carrying the
//! [`LOGGING_ENV_PREFIX`](crate::LOGGING_ENV_PREFIX) overlay individual keys
//! before the result is deserialised into [`LoggingSettings`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::defaults::{LOGGING_ENV_PREFIX, default_log_filter_string};
use crate::environment::Environment;

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    Json,
    /// Human-readable single line output.
    #[default]
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

/// How often the log file rolls over.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogRotation {
    /// A new file every minute.
    Minutely,
    /// A new file every hour.
    Hourly,
    /// A new file every day.
    #[default]
    Daily,
    /// A single file that never rolls.
    Never,
}

/// Console sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleSettings {
    /// Whether records are written to standard error.
    pub enabled: bool,
    /// Record layout.
    pub format: LogFormat,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            format: LogFormat::Compact,
        }
    }
}

/// Rolling file sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileSettings {
    /// Whether records are written to files.
    pub enabled: bool,
    /// Record layout.
    pub format: LogFormat,
    /// Directory for log files; the resolved log directory when unset.
    pub directory: Option<PathBuf>,
    /// File name prefix.
    pub prefix: String,
    /// File name suffix.
    pub suffix: String,
    /// Rollover interval.
    pub rotation: LogRotation,
    /// Number of rolled files to keep; unlimited when unset.
    pub max_files: Option<usize>,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            format: LogFormat::Compact,
            directory: None,
            prefix: "kino".to_owned(),
            suffix: "log".to_owned(),
            rotation: LogRotation::Daily,
            max_files: Some(31),
        }
    }
}

impl FileSettings {
    /// Directory the file sink writes into.
    #[must_use]
    pub fn directory_or<'a>(&'a self, log_dir: &'a Path) -> &'a Path {
        self.directory.as_deref().unwrap_or(log_dir)
    }
}

/// Structured logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// `tracing` filter directive, for example `info,kinod=debug`.
    pub filter: String,
    /// Console sink.
    pub console: ConsoleSettings,
    /// Rolling file sink.
    pub file: FileSettings,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter_string(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

/// Errors raised while reading logging settings.
#[derive(Debug, Error)]
pub enum LoggingSettingsError {
    /// The document is not valid JSON.
    #[error("failed to parse logging configuration: {source}")]
    Parse {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The document is JSON but not a JSON object.
    #[error("logging configuration must be a JSON object")]
    NotAnObject,
    /// An override variable named no key.
    #[error("environment override '{variable}' does not name a setting")]
    EmptyOverride {
        /// Offending variable name.
        variable: String,
    },
    /// An override descended into a value that is not an object.
    #[error("environment override '{variable}' conflicts with non-object key '{key}'")]
    OverrideConflict {
        /// Offending variable name.
        variable: String,
        /// Key that holds a scalar.
        key: String,
    },
    /// The merged document does not match the settings schema.
    #[error("invalid logging configuration: {source}")]
    Schema {
        /// Underlying deserialisation error.
        #[source]
        source: serde_json::Error,
    },
}

impl LoggingSettings {
    /// Parses `document`, applying environment overrides on top.
    ///
    /// # Errors
    ///
    /// Returns [`LoggingSettingsError`] when the document is malformed, an
    /// override cannot be applied, or the merged result does not fit the
    /// schema.
    pub fn from_json_with_overrides(
        document: &str,
        env: &dyn Environment,
    ) -> Result<Self, LoggingSettingsError> {
        let mut root: Value = serde_json::from_str(document)
            .map_err(|source| LoggingSettingsError::Parse { source })?;
        let Value::Object(object) = &mut root else {
            return Err(LoggingSettingsError::NotAnObject);
        };
        for (variable, raw) in env.vars_with_prefix(LOGGING_ENV_PREFIX) {
            apply_override(object, &variable, &raw)?;
        }
        serde_json::from_value(root).map_err(|source| LoggingSettingsError::Schema { source })
    }
}

fn apply_override(
    root: &mut Map<String, Value>,
    variable: &str,
    raw: &str,
) -> Result<(), LoggingSettingsError> {
    let keys: Vec<String> = variable
        .strip_prefix(LOGGING_ENV_PREFIX)
        .unwrap_or(variable)
        .split("__")
        .filter(|segment| !segment.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    let Some((leaf, parents)) = keys.split_last() else {
        return Err(LoggingSettingsError::EmptyOverride {
            variable: variable.to_owned(),
        });
    };

    let mut cursor = root;
    for key in parents {
        let entry = cursor
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        cursor = match entry {
            Value::Object(map) => map,
            _ => {
                return Err(LoggingSettingsError::OverrideConflict {
                    variable: variable.to_owned(),
                    key: key.clone(),
                });
            }
        };
    }
    cursor.insert(leaf.clone(), override_value(raw));
    Ok(())
}

/// Scalars such as `false`, `7`, or `null` keep their JSON type; anything
/// else is taken as a string.
fn override_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => value,
        _ => Value::String(raw.to_owned()),
    }
}

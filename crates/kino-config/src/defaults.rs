//! Names and defaults shared by the server binaries.

/// Subdirectory appended to the platform data directory.
pub const APP_DIRECTORY_NAME: &str = "kino";

/// Environment variable overriding the program data directory.
pub const DATA_PATH_ENV_VAR: &str = "KINO_DATA_PATH";

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV_VAR: &str = "KINO_CONFIG_DIR";

/// Environment variable overriding the log directory.
pub const LOG_DIR_ENV_VAR: &str = "KINO_LOG_DIR";

/// Environment variable selecting how unhandled panics are treated.
pub const FAULT_POLICY_ENV_VAR: &str = "KINO_FAULT_POLICY";

/// Prefix for environment variables overriding `logging.json` keys.
///
/// The remainder of the variable name is a `__`-separated key path, so
/// `KINO_LOGGING__FILE__ROTATION=hourly` sets `file.rotation`.
pub const LOGGING_ENV_PREFIX: &str = "KINO_LOGGING__";

/// File name of the structured logging configuration.
pub const LOGGING_CONFIG_FILE: &str = "logging.json";

/// Subdirectory of program data holding configuration by default.
pub(crate) const CONFIG_SUBDIRECTORY: &str = "config";

/// Subdirectory of program data holding log files by default.
pub(crate) const LOG_SUBDIRECTORY: &str = "log";

const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

pub(crate) fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

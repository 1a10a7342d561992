//! Startup configuration shared by the kino server binaries.
//!
//! The crate turns the raw process inputs (the argument vector and the
//! environment) into immutable values the rest of the server reads:
//! [`StartupOptions`] for the command line, [`ApplicationPaths`] for the
//! resolved directory layout, and [`LoggingSettings`] for the structured
//! logging configuration stored in `logging.json`.
//!
//! Environment access goes through the [`Environment`] trait so path
//! resolution and logging overrides can be exercised without mutating the
//! process environment.

mod defaults;
mod environment;
mod logging;
mod options;
mod paths;

pub use defaults::{
    APP_DIRECTORY_NAME, CONFIG_DIR_ENV_VAR, DATA_PATH_ENV_VAR, FAULT_POLICY_ENV_VAR,
    LOG_DIR_ENV_VAR, LOGGING_CONFIG_FILE, LOGGING_ENV_PREFIX, default_log_filter,
};
pub use environment::{Environment, StaticEnvironment, SystemEnvironment};
pub use logging::{
    ConsoleSettings, FileSettings, LogFormat, LogFormatParseError, LogRotation, LoggingSettings,
    LoggingSettingsError,
};
pub use options::{OptionsError, StartupAction, StartupFlag, StartupOptions, usage};
pub use paths::{ApplicationPaths, PathsError};

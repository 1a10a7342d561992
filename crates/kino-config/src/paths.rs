//! Resolves the directory layout used by the running server.
//!
//! Each writable directory is chosen from, in order, its environment
//! override, its command-line flag, and a computed default. Config and log
//! directories default to subdirectories of program data. Every directory is
//! created before [`ApplicationPaths`] is handed out.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::defaults::{
    APP_DIRECTORY_NAME, CONFIG_DIR_ENV_VAR, CONFIG_SUBDIRECTORY, DATA_PATH_ENV_VAR,
    LOG_DIR_ENV_VAR, LOG_SUBDIRECTORY, LOGGING_CONFIG_FILE,
};
use crate::environment::Environment;
use crate::options::StartupOptions;

/// Errors raised while resolving application paths.
#[derive(Debug, Error)]
pub enum PathsError {
    /// A directory could not be created.
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// No home directory was available to derive the data directory from.
    #[error("cannot determine the home directory to place program data under")]
    MissingHome,
    /// The current working directory could not be read.
    #[error("failed to resolve relative path '{path}': {source}")]
    Absolute {
        /// Path that could not be made absolute.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The running executable could not be located.
    #[error("failed to locate the running executable: {source}")]
    Executable {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Absolute directories used by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationPaths {
    program_data_dir: PathBuf,
    config_dir: PathBuf,
    log_dir: PathBuf,
    app_dir: PathBuf,
}

impl ApplicationPaths {
    /// Resolves and creates the directory layout.
    ///
    /// # Errors
    ///
    /// Returns [`PathsError`] when a directory cannot be created or a default
    /// location cannot be derived. Startup cannot continue without writable
    /// state storage, so callers treat this as fatal.
    pub fn resolve(options: &StartupOptions, env: &dyn Environment) -> Result<Self, PathsError> {
        let program_data_dir = match pick(env, DATA_PATH_ENV_VAR, options.program_data()) {
            Some(path) => absolute(path)?,
            None => default_program_data(env)?,
        };
        let config_dir = match pick(env, CONFIG_DIR_ENV_VAR, options.config_dir()) {
            Some(path) => absolute(path)?,
            None => program_data_dir.join(CONFIG_SUBDIRECTORY),
        };
        let log_dir = match pick(env, LOG_DIR_ENV_VAR, options.log_dir()) {
            Some(path) => absolute(path)?,
            None => program_data_dir.join(LOG_SUBDIRECTORY),
        };
        let app_dir = executable_dir()?;

        for dir in [&program_data_dir, &config_dir, &log_dir] {
            ensure_directory(dir)?;
        }

        Ok(Self {
            program_data_dir,
            config_dir,
            log_dir,
            app_dir,
        })
    }

    /// Root directory for databases and other program data.
    #[must_use]
    pub fn program_data_dir(&self) -> &Path {
        &self.program_data_dir
    }

    /// Directory holding configuration files.
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Directory receiving log files.
    #[must_use]
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Directory containing the running executable.
    #[must_use]
    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    /// Location of the structured logging configuration.
    #[must_use]
    pub fn logging_config_path(&self) -> PathBuf {
        self.config_dir.join(LOGGING_CONFIG_FILE)
    }
}

/// Environment override first, then the command-line flag.
fn pick(env: &dyn Environment, key: &str, flag: Option<&Path>) -> Option<PathBuf> {
    env.non_empty(key)
        .map(PathBuf::from)
        .or_else(|| flag.filter(|path| !path.as_os_str().is_empty()).map(Path::to_path_buf))
}

fn default_program_data(env: &dyn Environment) -> Result<PathBuf, PathsError> {
    let mut base = platform_data_home(env)?;
    base.push(APP_DIRECTORY_NAME);
    Ok(base)
}

#[cfg(windows)]
fn platform_data_home(_env: &dyn Environment) -> Result<PathBuf, PathsError> {
    dirs::data_dir().ok_or(PathsError::MissingHome)
}

#[cfg(not(windows))]
fn platform_data_home(env: &dyn Environment) -> Result<PathBuf, PathsError> {
    if let Some(xdg) = env.non_empty("XDG_DATA_HOME") {
        return absolute(PathBuf::from(xdg));
    }
    let home = env
        .non_empty("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .ok_or(PathsError::MissingHome)?;
    Ok(home.join(".local").join("share"))
}

fn absolute(path: PathBuf) -> Result<PathBuf, PathsError> {
    if path.is_absolute() {
        return Ok(path);
    }
    std::path::absolute(&path).map_err(|source| PathsError::Absolute { path, source })
}

fn executable_dir() -> Result<PathBuf, PathsError> {
    let exe = env::current_exe().map_err(|source| PathsError::Executable { source })?;
    Ok(exe.parent().map_or_else(|| exe.clone(), Path::to_path_buf))
}

fn ensure_directory(dir: &Path) -> Result<(), PathsError> {
    fs::create_dir_all(dir).map_err(|source| PathsError::CreateDirectory {
        path: dir.to_path_buf(),
        source,
    })
}

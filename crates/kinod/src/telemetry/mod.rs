//! Structured telemetry initialisation for the server.
//!
//! Logging is configured from `<config_dir>/logging.json`, which is written
//! from the bundled default on first run. Any failure along that path
//! installs a fallback instead (compact console output plus a daily file in
//! the log directory) and records the failure as a fatal event, so the
//! process always starts with working logging.

mod provision;

use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::Dispatch;
use tracing::dispatcher;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use kino_config::{
    ApplicationPaths, Environment, FileSettings, LogFormat, LogRotation, LoggingSettings,
    LoggingSettingsError, default_log_filter,
};

pub(crate) use provision::DEFAULT_LOGGING_CONFIG;

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");
const FALLBACK_FILE_PREFIX: &str = "kino";
const FALLBACK_FILE_SUFFIX: &str = "log";

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Handle returned when telemetry has been initialised.
///
/// Owns the background writers of the file sinks; dropping it flushes them.
#[derive(Debug, Default)]
pub struct TelemetryHandle {
    _guards: Vec<WorkerGuard>,
}

/// Errors encountered while configuring telemetry.
///
/// None of these escape [`bootstrap`]; they are recorded through the
/// fallback subscriber instead.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Writing the default `logging.json` failed.
    #[error("failed to provision logging configuration '{path}': {source}")]
    Provision {
        /// Target configuration path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Reading `logging.json` failed.
    #[error("failed to read logging configuration '{path}': {source}")]
    Read {
        /// Configuration path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// `logging.json` or its environment overrides were invalid.
    #[error("{source} (in '{path}')")]
    Settings {
        /// Configuration path.
        path: PathBuf,
        /// Underlying settings error.
        #[source]
        source: LoggingSettingsError,
    },
    /// The configured filter expression did not parse.
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        /// Offending filter expression.
        filter: String,
        /// Underlying parse error.
        #[source]
        source: ParseError,
    },
    /// The rolling file appender could not be created.
    #[error("failed to open log directory '{directory}': {source}")]
    Appender {
        /// Directory the appender writes into.
        directory: PathBuf,
        /// Underlying appender error.
        #[source]
        source: InitError,
    },
}

/// Which configuration the prepared subscriber came from.
#[derive(Debug)]
pub enum LoggingOutcome {
    /// `logging.json` was loaded.
    Configured {
        /// Configuration path.
        path: PathBuf,
        /// Whether the file was written from the bundled default.
        provisioned: bool,
    },
    /// The fallback configuration is active.
    Fallback {
        /// Why the primary configuration could not be used.
        error: TelemetryError,
        /// Why the fallback file sink is missing, if it is.
        file_error: Option<TelemetryError>,
    },
}

impl LoggingOutcome {
    /// Whether the fallback configuration is active.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// Emits the records describing this outcome to the current dispatcher.
    pub fn report(&self) {
        match self {
            Self::Configured { path, provisioned } => {
                if *provisioned {
                    tracing::info!(
                        target: TELEMETRY_TARGET,
                        path = %path.display(),
                        "wrote default logging configuration"
                    );
                }
                tracing::debug!(
                    target: TELEMETRY_TARGET,
                    path = %path.display(),
                    "logging configured"
                );
            }
            Self::Fallback { error, file_error } => {
                tracing::error!(
                    target: TELEMETRY_TARGET,
                    severity = "fatal",
                    error = %error,
                    "failed to configure logging, using fallback configuration: {error}"
                );
                if let Some(file_error) = file_error {
                    tracing::error!(
                        target: TELEMETRY_TARGET,
                        severity = "fatal",
                        error = %file_error,
                        "fallback log file unavailable, logging to console only"
                    );
                }
            }
        }
    }
}

/// A subscriber built but not yet installed.
#[derive(Debug)]
pub struct LoggingBootstrap {
    dispatch: Dispatch,
    guards: Vec<WorkerGuard>,
    outcome: LoggingOutcome,
}

impl LoggingBootstrap {
    /// The prepared dispatcher.
    #[must_use]
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Which configuration was used.
    #[must_use]
    pub fn outcome(&self) -> &LoggingOutcome {
        &self.outcome
    }

    /// Splits the bootstrap into its dispatcher, writer handle, and outcome
    /// so callers can scope the subscriber themselves.
    #[must_use]
    pub fn into_parts(self) -> (Dispatch, TelemetryHandle, LoggingOutcome) {
        let Self {
            dispatch,
            guards,
            outcome,
        } = self;
        (dispatch, TelemetryHandle { _guards: guards }, outcome)
    }

    /// Installs the subscriber as the process-wide default and reports the
    /// outcome through it.
    ///
    /// Only the first installation takes effect; later calls keep the
    /// existing global subscriber.
    pub fn install(self) -> TelemetryHandle {
        let (dispatch, handle, outcome) = self.into_parts();
        if let Err(error) =
            TELEMETRY_GUARD.get_or_try_init(|| dispatcher::set_global_default(dispatch))
        {
            tracing::warn!(
                target: TELEMETRY_TARGET,
                error = %error,
                "a global subscriber is already installed"
            );
        }
        outcome.report();
        handle
    }
}

/// Builds the subscriber described by `logging.json`, or the fallback.
///
/// Never fails: any error selects the fallback and is carried in the
/// returned [`LoggingOutcome`].
#[must_use]
pub fn prepare(paths: &ApplicationPaths, env: &dyn Environment) -> LoggingBootstrap {
    match configured(paths, env) {
        Ok(bootstrap) => bootstrap,
        Err(error) => fallback(paths.log_dir(), error),
    }
}

/// Installs process-wide logging; see [`prepare`].
///
/// # Examples
///
/// ```rust,no_run
/// use kino_config::{ApplicationPaths, StartupOptions, SystemEnvironment};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let options = StartupOptions::parse_from(["kinod"])?;
/// let paths = ApplicationPaths::resolve(&options, &SystemEnvironment)?;
/// let _telemetry = kinod::telemetry::bootstrap(&paths, &SystemEnvironment);
/// tracing::info!("logging is ready");
/// # Ok(())
/// # }
/// ```
pub fn bootstrap(paths: &ApplicationPaths, env: &dyn Environment) -> TelemetryHandle {
    prepare(paths, env).install()
}

fn configured(
    paths: &ApplicationPaths,
    env: &dyn Environment,
) -> Result<LoggingBootstrap, TelemetryError> {
    let path = paths.logging_config_path();
    let provisioned = provision::write_if_absent(&path, DEFAULT_LOGGING_CONFIG.as_bytes())
        .map_err(|source| TelemetryError::Provision {
            path: path.clone(),
            source,
        })?;
    let document = fs::read_to_string(&path).map_err(|source| TelemetryError::Read {
        path: path.clone(),
        source,
    })?;
    let settings = LoggingSettings::from_json_with_overrides(&document, env).map_err(|source| {
        TelemetryError::Settings {
            path: path.clone(),
            source,
        }
    })?;
    let filter = EnvFilter::try_new(&settings.filter).map_err(|source| TelemetryError::Filter {
        filter: settings.filter.clone(),
        source,
    })?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guards = Vec::new();
    if settings.console.enabled {
        layers.push(console_layer(settings.console.format));
    }
    if settings.file.enabled {
        let (layer, guard) = file_layer(&settings.file, paths.log_dir())?;
        layers.push(layer);
        guards.push(guard);
    }

    Ok(LoggingBootstrap {
        dispatch: Dispatch::new(Registry::default().with(layers).with(filter)),
        guards,
        outcome: LoggingOutcome::Configured { path, provisioned },
    })
}

fn fallback(log_dir: &Path, error: TelemetryError) -> LoggingBootstrap {
    let settings = FileSettings {
        format: LogFormat::Compact,
        prefix: FALLBACK_FILE_PREFIX.to_owned(),
        suffix: FALLBACK_FILE_SUFFIX.to_owned(),
        rotation: LogRotation::Daily,
        max_files: None,
        ..FileSettings::default()
    };
    let mut layers = vec![console_layer(LogFormat::Compact)];
    let mut guards = Vec::new();
    let file_error = match file_layer(&settings, log_dir) {
        Ok((layer, guard)) => {
            layers.push(layer);
            guards.push(guard);
            None
        }
        Err(file_error) => Some(file_error),
    };
    let filter = EnvFilter::new(default_log_filter());

    LoggingBootstrap {
        dispatch: Dispatch::new(Registry::default().with(layers).with(filter)),
        guards,
        outcome: LoggingOutcome::Fallback { error, file_error },
    }
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(io::stderr)
        // Avoid stray colour codes in non-TTY sinks while keeping colour on
        // interactive terminals.
        .with_ansi(io::stderr().is_terminal())
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_timer(UtcTime::rfc_3339());
    match format {
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

fn file_layer(
    settings: &FileSettings,
    log_dir: &Path,
) -> Result<(BoxedLayer, WorkerGuard), TelemetryError> {
    let directory = settings.directory_or(log_dir);
    let mut builder = RollingFileAppender::builder()
        .rotation(rotation(settings.rotation))
        .filename_prefix(settings.prefix.as_str())
        .filename_suffix(settings.suffix.as_str());
    if let Some(max_files) = settings.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder
        .build(directory)
        .map_err(|source| TelemetryError::Appender {
            directory: directory.to_path_buf(),
            source,
        })?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339());
    let layer = match settings.format {
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    };
    Ok((layer, guard))
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

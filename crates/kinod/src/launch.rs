//! Entry point sequencing: command line, paths, logging, lifecycle, restart.

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;

use kino_config::{
    ApplicationPaths, Environment, OptionsError, PathsError, StartupAction, StartupOptions,
    SystemEnvironment, usage,
};

use crate::health::{LifecycleReporter, StructuredLifecycleReporter};
use crate::host::{HostContext, HostFactory};
use crate::lifecycle::{
    LifecycleContext, LifecycleController, LifecycleError, SystemTraps, TrapInstaller,
};
use crate::placeholder_host::IdleHost;
use crate::restart::{ProcessSpawner, RestartError, SystemSpawner, relaunch};
use crate::telemetry::{self, TelemetryHandle};

/// Exit code for command-line usage and validation errors.
pub const USAGE_EXIT_CODE: u8 = 2;

/// Errors that end the process before or after the lifecycle run.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The command line was malformed or inconsistent.
    #[error(transparent)]
    Options {
        /// Underlying options error.
        #[from]
        source: OptionsError,
    },
    /// Application directories could not be resolved or created.
    #[error("failed to prepare application directories: {source}")]
    Paths {
        /// Underlying paths error.
        #[from]
        source: PathsError,
    },
    /// Writing help or version text failed.
    #[error("failed to write to standard output: {source}")]
    Output {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Startup of the lifecycle run failed.
    #[error(transparent)]
    Lifecycle {
        /// Underlying lifecycle error.
        #[from]
        source: LifecycleError,
    },
    /// The replacement process could not be started.
    #[error(transparent)]
    Restart {
        /// Underlying restart error.
        #[from]
        source: RestartError,
    },
}

impl LaunchError {
    /// Exit code the process finishes with for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Options { .. } => USAGE_EXIT_CODE,
            _ => 1,
        }
    }
}

/// Installs process-wide logging once paths are known.
pub trait TelemetryInstaller {
    /// Installs logging and returns the handle that keeps it alive.
    fn install(&self, paths: &ApplicationPaths, env: &dyn Environment) -> TelemetryHandle;
}

/// Installs the global `tracing` subscriber through [`telemetry::bootstrap`].
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalTelemetry;

impl TelemetryInstaller for GlobalTelemetry {
    fn install(&self, paths: &ApplicationPaths, env: &dyn Environment) -> TelemetryHandle {
        telemetry::bootstrap(paths, env)
    }
}

/// Collaborators required to launch the server.
pub struct LaunchPlan<'a> {
    /// Environment variables consulted for paths, logging, and fault policy.
    pub environment: &'a dyn Environment,
    /// Logging installer.
    pub telemetry: &'a dyn TelemetryInstaller,
    /// Signal and fault traps.
    pub traps: &'a dyn TrapInstaller,
    /// Builds the application host.
    pub hosts: &'a dyn HostFactory,
    /// Starts the replacement process after a restart request.
    pub spawner: &'a dyn ProcessSpawner,
    /// Lifecycle event sink.
    pub reporter: Arc<dyn LifecycleReporter>,
}

/// Runs the server with the production collaborators.
///
/// Help, version, and usage errors are written to `stdout`.
pub fn run<I, T>(args: I, stdout: &mut dyn Write) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let environment = SystemEnvironment;
    let traps = SystemTraps::from_environment(&environment);
    let plan = LaunchPlan {
        environment: &environment,
        telemetry: &GlobalTelemetry,
        traps: &traps,
        hosts: &IdleHost::create,
        spawner: &SystemSpawner,
        reporter: Arc::new(StructuredLifecycleReporter::new()),
    };
    run_with(args, stdout, &plan)
}

/// Runs the server with injected collaborators and maps the result to a
/// process exit code.
pub fn run_with<I, T>(args: I, stdout: &mut dyn Write, plan: &LaunchPlan<'_>) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    match launch_with(args, stdout, plan) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(error) => {
            match &error {
                LaunchError::Options { source } => {
                    if let Err(write_error) = writeln!(stdout, "{source}") {
                        eprintln!(
                            "{}: {source} (stdout unavailable: {write_error})",
                            env!("CARGO_PKG_NAME")
                        );
                    }
                }
                LaunchError::Paths { .. } | LaunchError::Output { .. } => {
                    eprintln!("{}: {error}", env!("CARGO_PKG_NAME"));
                }
                // Already reported through the lifecycle reporter.
                LaunchError::Lifecycle { .. } | LaunchError::Restart { .. } => {}
            }
            ExitCode::from(error.exit_code())
        }
    }
}

/// Runs the full startup, lifecycle, and restart sequence.
///
/// Returns the exit code of a completed run: `0` after help, version, or a
/// host-requested shutdown, `128 + n` after signal `n`, and `1` after a
/// fault under the shutdown policy.
///
/// # Errors
///
/// Returns [`LaunchError`] for invalid command lines, unusable directories,
/// failed host startup, and failed restarts. The host is disposed before a
/// lifecycle error is returned.
pub fn launch_with<I, T>(
    args: I,
    stdout: &mut dyn Write,
    plan: &LaunchPlan<'_>,
) -> Result<i32, LaunchError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let options = match StartupOptions::parse_from(args)?.action()? {
        StartupAction::ShowHelp => {
            return write_output(stdout, &usage());
        }
        StartupAction::ShowVersion => {
            return write_output(stdout, &format!("{}\n", env!("CARGO_PKG_VERSION")));
        }
        StartupAction::Run(options) => options,
    };

    let paths = ApplicationPaths::resolve(&options, plan.environment)?;
    let _telemetry = plan.telemetry.install(&paths, plan.environment);
    plan.reporter.environment(&paths, &options);

    let context = LifecycleContext::new();
    let host_context = HostContext::new(paths, options, context.clone());
    let mut controller = LifecycleController::new(context, Arc::clone(&plan.reporter));
    let outcome = controller.run(plan.traps, plan.hosts, &host_context)?;

    if outcome.restart {
        match relaunch(host_context.options(), plan.spawner) {
            Ok(restart) => plan.reporter.restart_launched(&restart),
            Err(error) => {
                plan.reporter.restart_failed(&error);
                return Err(error.into());
            }
        }
    }
    Ok(outcome.exit_code)
}

fn write_output(stdout: &mut dyn Write, text: &str) -> Result<i32, LaunchError> {
    stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|source| LaunchError::Output { source })?;
    Ok(0)
}

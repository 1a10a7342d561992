//! Launches a replacement server process after a restart request.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use kino_config::StartupOptions;

/// Errors raised while relaunching the server.
#[derive(Debug, Error)]
pub enum RestartError {
    /// No executable was supplied and the running one could not be located.
    #[error("failed to locate the server executable: {source}")]
    Executable {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The replacement process could not be started.
    #[error("failed to start '{executable}': {source}")]
    Spawn {
        /// Executable that was launched.
        executable: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// The command that starts the replacement process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPlan {
    executable: PathBuf,
    arguments: String,
}

impl RestartPlan {
    /// Builds a plan from explicit parts.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>, arguments: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            arguments: arguments.into(),
        }
    }

    /// Derives the plan from the command line of the current process.
    ///
    /// The executable is `-restartpath` when given and not blank, otherwise
    /// the invoked program, otherwise the running executable. The arguments
    /// are `-restartargs` when given, even if empty; otherwise the original
    /// arguments are replayed.
    ///
    /// # Errors
    ///
    /// Returns [`RestartError::Executable`] when the running executable has
    /// to be looked up and cannot be.
    pub fn from_options(options: &StartupOptions) -> Result<Self, RestartError> {
        let invocation = options.invocation();
        let executable = match options.restart_path().filter(|path| !is_blank(path)) {
            Some(path) => path.to_path_buf(),
            None => match invocation.first().filter(|program| !program.is_empty()) {
                Some(program) => PathBuf::from(program),
                None => {
                    std::env::current_exe().map_err(|source| RestartError::Executable { source })?
                }
            },
        };
        let arguments = match options.restart_args() {
            Some(arguments) => arguments.to_owned(),
            None => join_arguments(invocation.iter().skip(1)),
        };
        Ok(Self {
            executable,
            arguments,
        })
    }

    /// Program to start.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Argument string passed to the program.
    #[must_use]
    pub fn arguments(&self) -> &str {
        &self.arguments
    }
}

fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

/// Joins arguments with single spaces, wrapping any argument that is empty
/// or contains a space in double quotes.
pub fn join_arguments<I, S>(arguments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    arguments
        .into_iter()
        .map(|argument| {
            let argument = argument.as_ref().to_string_lossy();
            if argument.is_empty() || argument.contains(' ') {
                format!("\"{argument}\"")
            } else {
                argument.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits an argument string on whitespace, keeping double-quoted runs
/// together and dropping the quotes.
#[must_use]
pub fn split_arguments(arguments: &str) -> Vec<String> {
    let mut parsed = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut pending = false;
    for character in arguments.chars() {
        match character {
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if pending {
                    parsed.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        parsed.push(current);
    }
    parsed
}

/// Starts processes on behalf of the restart launcher.
pub trait ProcessSpawner: Send + Sync {
    /// Starts the planned process without waiting for it.
    fn spawn(&self, plan: &RestartPlan) -> Result<(), RestartError>;
}

/// Spawner that starts an independent child with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpawner;

impl ProcessSpawner for SystemSpawner {
    fn spawn(&self, plan: &RestartPlan) -> Result<(), RestartError> {
        let mut command = Command::new(plan.executable());
        apply_arguments(&mut command, plan.arguments());
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map(drop)
            .map_err(|source| RestartError::Spawn {
                executable: plan.executable().to_path_buf(),
                source,
            })
    }
}

#[cfg(windows)]
fn apply_arguments(command: &mut Command, arguments: &str) {
    use std::os::windows::process::CommandExt;

    if !arguments.is_empty() {
        command.raw_arg(arguments);
    }
}

#[cfg(not(windows))]
fn apply_arguments(command: &mut Command, arguments: &str) {
    command.args(split_arguments(arguments));
}

/// Computes the restart plan and hands it to `spawner`.
///
/// # Errors
///
/// Returns [`RestartError`] when the plan cannot be derived or the spawner
/// fails.
pub fn relaunch(
    options: &StartupOptions,
    spawner: &dyn ProcessSpawner,
) -> Result<RestartPlan, RestartError> {
    let plan = RestartPlan::from_options(options)?;
    spawner.spawn(&plan)?;
    Ok(plan)
}

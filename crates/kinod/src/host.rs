//! Seam between the lifecycle controller and the rest of the server.

use thiserror::Error;

use kino_config::{ApplicationPaths, StartupOptions};

use crate::lifecycle::LifecycleContext;

/// Errors reported by an application host or its factory.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HostError {
    message: String,
    /// Optional source error reported by the host implementation.
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HostError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-readable message describing the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Everything a host needs from the process: where to keep its state, how
/// it was invoked, and a handle for requesting shutdown or restart.
#[derive(Debug, Clone)]
pub struct HostContext {
    paths: ApplicationPaths,
    options: StartupOptions,
    lifecycle: LifecycleContext,
}

impl HostContext {
    /// Bundles the resolved paths, options, and lifecycle handle.
    #[must_use]
    pub fn new(paths: ApplicationPaths, options: StartupOptions, lifecycle: LifecycleContext) -> Self {
        Self {
            paths,
            options,
            lifecycle,
        }
    }

    /// Resolved application directories.
    #[must_use]
    pub fn paths(&self) -> &ApplicationPaths {
        &self.paths
    }

    /// Parsed command line.
    #[must_use]
    pub fn options(&self) -> &StartupOptions {
        &self.options
    }

    /// Shared shutdown and restart handle.
    #[must_use]
    pub fn lifecycle(&self) -> &LifecycleContext {
        &self.lifecycle
    }
}

/// The aggregate that represents the rest of the server for one run.
///
/// The controller calls [`initialize`](Self::initialize), then
/// [`run_startup_tasks`](Self::run_startup_tasks), and finally
/// [`dispose`](Self::dispose) exactly once on every exit path.
pub trait ApplicationHost: Send {
    /// Prepares services using the process context.
    fn initialize(&mut self, context: &HostContext) -> Result<(), HostError>;

    /// Runs the work that must finish before the server counts as started.
    fn run_startup_tasks(&mut self) -> Result<(), HostError>;

    /// Releases every resource the host holds.
    fn dispose(&mut self);
}

/// Builds the application host once paths and options are known.
pub trait HostFactory {
    /// Creates a host for one lifecycle run.
    fn create(
        &self,
        paths: &ApplicationPaths,
        options: &StartupOptions,
    ) -> Result<Box<dyn ApplicationHost>, HostError>;
}

impl<F> HostFactory for F
where
    F: Fn(&ApplicationPaths, &StartupOptions) -> Result<Box<dyn ApplicationHost>, HostError>,
{
    fn create(
        &self,
        paths: &ApplicationPaths,
        options: &StartupOptions,
    ) -> Result<Box<dyn ApplicationHost>, HostError> {
        self(paths, options)
    }
}

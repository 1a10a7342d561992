//! Drives one run of the application host from startup to disposal.

use std::sync::Arc;

use crate::health::LifecycleReporter;
use crate::host::{ApplicationHost, HostContext, HostFactory};

use super::context::{LifecycleContext, ShutdownRequest, ShutdownTrigger};
use super::errors::LifecycleError;
use super::state::LifecycleState;
use super::traps::TrapInstaller;

/// How a completed run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// The trigger that released the main thread.
    pub trigger: ShutdownTrigger,
    /// Exit code the process should finish with.
    pub exit_code: i32,
    /// Whether a replacement process should be launched.
    pub restart: bool,
}

impl From<ShutdownRequest> for RunOutcome {
    fn from(request: ShutdownRequest) -> Self {
        Self {
            trigger: request.trigger,
            exit_code: request.exit_code(),
            restart: request.restart,
        }
    }
}

/// Owns a host for one run and disposes it exactly once, including when the
/// run unwinds.
struct HostGuard {
    host: Option<Box<dyn ApplicationHost>>,
    reporter: Arc<dyn LifecycleReporter>,
}

impl HostGuard {
    fn new(host: Box<dyn ApplicationHost>, reporter: Arc<dyn LifecycleReporter>) -> Self {
        Self {
            host: Some(host),
            reporter,
        }
    }

    fn start(&mut self, context: &HostContext) -> Result<(), LifecycleError> {
        let Some(host) = self.host.as_mut() else {
            return Ok(());
        };
        host.initialize(context)
            .map_err(|source| LifecycleError::Initialize { source })?;
        host.run_startup_tasks()
            .map_err(|source| LifecycleError::StartupTasks { source })
    }

    fn dispose(&mut self) {
        if let Some(mut host) = self.host.take() {
            host.dispose();
            self.reporter.host_disposed();
        }
    }
}

impl Drop for HostGuard {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Sequences traps, host startup, the shutdown wait, and disposal.
pub struct LifecycleController {
    context: LifecycleContext,
    reporter: Arc<dyn LifecycleReporter>,
    state: LifecycleState,
}

impl LifecycleController {
    /// Builds a controller in the `Starting` state.
    #[must_use]
    pub fn new(context: LifecycleContext, reporter: Arc<dyn LifecycleReporter>) -> Self {
        Self {
            context,
            reporter,
            state: LifecycleState::Starting,
        }
    }

    /// Current state of the machine.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Shared shutdown handle driven by this controller.
    #[must_use]
    pub fn context(&self) -> &LifecycleContext {
        &self.context
    }

    /// Runs the host until a shutdown trigger fires, then disposes it.
    ///
    /// Traps stay registered for the whole run and are torn down after the
    /// host has been disposed.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when traps cannot be installed, the host
    /// cannot be created, or host startup fails. A host that was created is
    /// disposed before the error is returned.
    pub fn run(
        &mut self,
        traps: &dyn TrapInstaller,
        factory: &dyn HostFactory,
        host_context: &HostContext,
    ) -> Result<RunOutcome, LifecycleError> {
        let _traps = match traps.install(&self.context, Arc::clone(&self.reporter)) {
            Ok(registration) => registration,
            Err(source) => return self.abort(LifecycleError::Traps { source }, None),
        };
        let host = match factory.create(host_context.paths(), host_context.options()) {
            Ok(host) => host,
            Err(source) => return self.abort(LifecycleError::HostCreate { source }, None),
        };
        let mut guard = HostGuard::new(host, Arc::clone(&self.reporter));
        if let Err(error) = guard.start(host_context) {
            return self.abort(error, Some(&mut guard));
        }

        self.advance(LifecycleState::Running)?;
        let request = self.context.wait();
        self.advance(LifecycleState::ShuttingDown)?;
        self.reporter.shutdown_requested(&request);
        guard.dispose();
        self.advance(LifecycleState::Disposed)?;
        self.advance(if request.restart {
            LifecycleState::Restarting
        } else {
            LifecycleState::Exiting
        })?;
        Ok(RunOutcome::from(request))
    }

    fn abort(
        &mut self,
        error: LifecycleError,
        guard: Option<&mut HostGuard>,
    ) -> Result<RunOutcome, LifecycleError> {
        self.reporter.startup_failed(&error);
        self.advance(LifecycleState::ShuttingDown)?;
        if let Some(guard) = guard {
            guard.dispose();
        }
        self.advance(LifecycleState::Disposed)?;
        self.advance(LifecycleState::Exiting)?;
        Err(error)
    }

    fn advance(&mut self, next: LifecycleState) -> Result<(), LifecycleError> {
        let previous = self.state;
        self.state = previous.transition(next)?;
        self.reporter.state_changed(previous, next);
        Ok(())
    }
}

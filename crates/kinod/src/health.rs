//! Structured reporting for process lifecycle events.

use std::sync::Arc;

use kino_config::{ApplicationPaths, StartupOptions};

use crate::lifecycle::{
    FaultReport, LifecycleError, LifecycleState, ShutdownRequest, ShutdownTrigger, signal_name,
};
use crate::restart::{RestartError, RestartPlan};

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked once logging is available, with the resolved runtime
    /// environment.
    fn environment(&self, paths: &ApplicationPaths, options: &StartupOptions);

    /// Invoked after every state machine transition.
    fn state_changed(&self, from: LifecycleState, to: LifecycleState);

    /// Invoked when startup fails and the host is torn down.
    fn startup_failed(&self, error: &LifecycleError);

    /// Invoked from the signal listener for each delivered signal.
    fn signal_received(&self, signal: i32);

    /// Invoked on the main thread once the shutdown signal releases it.
    fn shutdown_requested(&self, request: &ShutdownRequest);

    /// Invoked when a trigger fires after shutdown was already requested.
    fn trigger_ignored(&self, trigger: ShutdownTrigger);

    /// Invoked from the panic hook for every unhandled fault.
    fn fault(&self, report: &FaultReport);

    /// Invoked after the host has been disposed.
    fn host_disposed(&self);

    /// Invoked after the replacement process was spawned.
    fn restart_launched(&self, plan: &RestartPlan);

    /// Invoked when the replacement process could not be spawned.
    fn restart_failed(&self, error: &RestartError);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn environment(&self, paths: &ApplicationPaths, options: &StartupOptions) {
        (**self).environment(paths, options);
    }

    fn state_changed(&self, from: LifecycleState, to: LifecycleState) {
        (**self).state_changed(from, to);
    }

    fn startup_failed(&self, error: &LifecycleError) {
        (**self).startup_failed(error);
    }

    fn signal_received(&self, signal: i32) {
        (**self).signal_received(signal);
    }

    fn shutdown_requested(&self, request: &ShutdownRequest) {
        (**self).shutdown_requested(request);
    }

    fn trigger_ignored(&self, trigger: ShutdownTrigger) {
        (**self).trigger_ignored(trigger);
    }

    fn fault(&self, report: &FaultReport) {
        (**self).fault(report);
    }

    fn host_disposed(&self) {
        (**self).host_disposed();
    }

    fn restart_launched(&self, plan: &RestartPlan) {
        (**self).restart_launched(plan);
    }

    fn restart_failed(&self, error: &RestartError) {
        (**self).restart_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn environment(&self, paths: &ApplicationPaths, options: &StartupOptions) {
        let command_line = options
            .invocation()
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "environment",
            version = env!("CARGO_PKG_VERSION"),
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            command_line = %command_line,
            program_data = %paths.program_data_dir().display(),
            config = %paths.config_dir().display(),
            log = %paths.log_dir().display(),
            app = %paths.app_dir().display(),
            "kino server starting"
        );
    }

    fn state_changed(&self, from: LifecycleState, to: LifecycleState) {
        tracing::debug!(
            target: LIFECYCLE_TARGET,
            event = "state_changed",
            from = %from,
            to = %to,
            "lifecycle state changed"
        );
    }

    fn startup_failed(&self, error: &LifecycleError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "startup_failed",
            error = %error,
            "error while starting server"
        );
    }

    fn signal_received(&self, signal: i32) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "signal_received",
            signal,
            name = signal_name(signal).unwrap_or("unknown"),
            "received signal, shutting down"
        );
    }

    fn shutdown_requested(&self, request: &ShutdownRequest) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "shutdown_requested",
            trigger = %request.trigger,
            restart = request.restart,
            exit_code = request.exit_code(),
            "shutdown requested"
        );
    }

    fn trigger_ignored(&self, trigger: ShutdownTrigger) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "trigger_ignored",
            trigger = %trigger,
            "shutdown already in progress"
        );
    }

    fn fault(&self, report: &FaultReport) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "fault",
            severity = "critical",
            panic = %report.message,
            location = report.location.as_deref().unwrap_or("unknown"),
            thread = report.thread.as_deref().unwrap_or("unnamed"),
            policy = %report.policy,
            "unhandled fault"
        );
    }

    fn host_disposed(&self) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "host_disposed",
            "application host disposed"
        );
    }

    fn restart_launched(&self, plan: &RestartPlan) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "restart_launched",
            executable = %plan.executable().display(),
            arguments = %plan.arguments(),
            "starting replacement process"
        );
    }

    fn restart_failed(&self, error: &RestartError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "restart_failed",
            error = %error,
            "failed to start replacement process"
        );
    }
}

//! Test double for [`LifecycleReporter`] that records structured events for
//! assertions.

use std::sync::Mutex;

use kino_config::{ApplicationPaths, StartupOptions};

use crate::health::LifecycleReporter;
use crate::lifecycle::{
    FaultReport, LifecycleError, LifecycleState, ShutdownRequest, ShutdownTrigger,
};
use crate::restart::{RestartError, RestartPlan};

/// Lifecycle events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The environment report was emitted.
    Environment,
    /// The state machine moved to the given state.
    State(LifecycleState),
    /// Startup failed with an error description.
    StartupFailed(String),
    /// A signal was delivered.
    SignalReceived(i32),
    /// The main thread was released.
    ShutdownRequested(ShutdownRequest),
    /// A trigger arrived after shutdown had been requested.
    TriggerIgnored(ShutdownTrigger),
    /// An unhandled fault with its message.
    Fault(String),
    /// The host was disposed.
    HostDisposed,
    /// A replacement process was spawned.
    RestartLaunched(RestartPlan),
    /// Spawning the replacement process failed.
    RestartFailed(String),
}

/// Records lifecycle events for assertions.
#[derive(Debug, Default)]
pub struct RecordingLifecycleReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingLifecycleReporter {
    /// Captures a copy of the recorded events, excluding state changes.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.all_events()
            .into_iter()
            .filter(|event| !matches!(event, LifecycleEvent::State(_)))
            .collect()
    }

    /// Captures the sequence of states the controller moved through.
    #[must_use]
    pub fn states(&self) -> Vec<LifecycleState> {
        self.all_events()
            .into_iter()
            .filter_map(|event| match event {
                LifecycleEvent::State(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    /// Counts recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&LifecycleEvent) -> bool) -> usize {
        self.all_events().iter().filter(|event| predicate(event)).count()
    }

    fn all_events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("lifecycle reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingLifecycleReporter {
    fn environment(&self, _paths: &ApplicationPaths, _options: &StartupOptions) {
        self.record(LifecycleEvent::Environment);
    }

    fn state_changed(&self, _from: LifecycleState, to: LifecycleState) {
        self.record(LifecycleEvent::State(to));
    }

    fn startup_failed(&self, error: &LifecycleError) {
        self.record(LifecycleEvent::StartupFailed(error.to_string()));
    }

    fn signal_received(&self, signal: i32) {
        self.record(LifecycleEvent::SignalReceived(signal));
    }

    fn shutdown_requested(&self, request: &ShutdownRequest) {
        self.record(LifecycleEvent::ShutdownRequested(*request));
    }

    fn trigger_ignored(&self, trigger: ShutdownTrigger) {
        self.record(LifecycleEvent::TriggerIgnored(trigger));
    }

    fn fault(&self, report: &FaultReport) {
        self.record(LifecycleEvent::Fault(report.message.clone()));
    }

    fn host_disposed(&self) {
        self.record(LifecycleEvent::HostDisposed);
    }

    fn restart_launched(&self, plan: &RestartPlan) {
        self.record(LifecycleEvent::RestartLaunched(plan.clone()));
    }

    fn restart_failed(&self, error: &RestartError) {
        self.record(LifecycleEvent::RestartFailed(error.to_string()));
    }
}

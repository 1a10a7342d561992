//! Asynchronous shutdown sources: termination signals and the panic hook.
//!
//! Each trap is a producer onto the shared [`LifecycleContext`]. Signals are
//! received on a dedicated `signal-hook` iterator thread; unhandled panics on
//! any thread are reported through a process-wide panic hook and, under
//! [`FaultPolicy::Shutdown`], also request shutdown.

use std::fmt;
use std::io;
use std::panic::{self, PanicHookInfo};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use strum::{Display, EnumString};
use thiserror::Error;

use kino_config::{Environment, FAULT_POLICY_ENV_VAR};

use crate::health::LifecycleReporter;

use super::context::{LifecycleContext, ShutdownTrigger};

const TRAPS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle::traps");

/// Signals that request a graceful shutdown.
pub const TERMINATION_SIGNALS: [i32; 3] = [SIGINT, SIGTERM, SIGQUIT];

/// What happens after an unhandled fault has been logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FaultPolicy {
    /// Log the fault and keep running.
    #[default]
    Log,
    /// Log the fault and request shutdown with exit code 1.
    Shutdown,
}

impl FaultPolicy {
    /// Reads the policy from [`FAULT_POLICY_ENV_VAR`]; unset or empty selects
    /// the default.
    ///
    /// # Errors
    ///
    /// Returns [`TrapError::FaultPolicy`] when the variable holds an unknown
    /// value.
    pub fn from_environment(env: &dyn Environment) -> Result<Self, TrapError> {
        let Some(raw) = env.non_empty(FAULT_POLICY_ENV_VAR) else {
            return Ok(Self::default());
        };
        let value = raw.to_string_lossy();
        value
            .trim()
            .parse()
            .map_err(|_| TrapError::FaultPolicy {
                value: value.into_owned(),
            })
    }
}

/// Errors raised while installing traps.
#[derive(Debug, Error)]
pub enum TrapError {
    /// Registering the signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Spawning the signal listener thread failed.
    #[error("failed to spawn signal listener: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The fault policy variable held an unknown value.
    #[error("unknown fault policy '{value}', expected 'log' or 'shutdown'")]
    FaultPolicy {
        /// Value read from the environment.
        value: String,
    },
}

/// Details of an unhandled fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultReport {
    /// Panic payload rendered as text.
    pub message: String,
    /// Source location of the panic, when known.
    pub location: Option<String>,
    /// Name of the panicking thread, when it has one.
    pub thread: Option<String>,
    /// Policy in force when the fault occurred.
    pub policy: FaultPolicy,
}

impl FaultReport {
    fn from_hook(info: &PanicHookInfo<'_>, policy: FaultPolicy) -> Self {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|text| (*text).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Self {
            message,
            location: info.location().map(ToString::to_string),
            thread: thread::current().name().map(str::to_owned),
            policy,
        }
    }
}

/// Installs the trap set for one lifecycle run.
pub trait TrapInstaller: Send + Sync {
    /// Registers traps that feed `context`.
    ///
    /// The returned registration tears the traps down when dropped.
    fn install(
        &self,
        context: &LifecycleContext,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> Result<TrapRegistration, TrapError>;
}

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Live trap registrations; dropping it closes the signal iterator, joins
/// the listener thread, and reinstates the panic hook that was active before
/// installation.
///
/// A registration dropped while its thread unwinds leaves the panic hook in
/// place: the hook cannot be swapped from a panicking thread.
#[derive(Default)]
pub struct TrapRegistration {
    signals: Option<(Handle, JoinHandle<()>)>,
    previous_hook: Option<Arc<PanicHook>>,
}

impl TrapRegistration {
    /// A registration that owns nothing.
    #[must_use]
    pub fn inert() -> Self {
        Self::default()
    }

    /// Whether a signal listener is attached.
    #[must_use]
    pub fn listens_for_signals(&self) -> bool {
        self.signals.is_some()
    }

    /// Whether this registration replaced the process panic hook.
    #[must_use]
    pub fn owns_panic_hook(&self) -> bool {
        self.previous_hook.is_some()
    }

    fn restore_panic_hook(previous: Arc<PanicHook>) {
        drop(panic::take_hook());
        match Arc::try_unwrap(previous) {
            Ok(hook) => panic::set_hook(hook),
            Err(shared) => panic::set_hook(Box::new(move |info| shared(info))),
        }
    }
}

impl fmt::Debug for TrapRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrapRegistration")
            .field("signals", &self.signals.is_some())
            .field("previous_hook", &self.previous_hook.is_some())
            .finish()
    }
}

impl Drop for TrapRegistration {
    fn drop(&mut self) {
        if let Some((handle, listener)) = self.signals.take() {
            handle.close();
            if listener.join().is_err() {
                tracing::warn!(target: TRAPS_TARGET, "signal listener exited by panicking");
            }
        }
        if let Some(previous) = self.previous_hook.take() {
            if thread::panicking() {
                tracing::debug!(
                    target: TRAPS_TARGET,
                    "leaving panic hook installed while unwinding"
                );
            } else {
                Self::restore_panic_hook(previous);
            }
        }
    }
}

/// Production traps: SIGINT, SIGTERM, and SIGQUIT plus the panic hook.
#[derive(Debug, Default)]
pub struct SystemTraps {
    policy: FaultPolicy,
    rejected_policy: Option<TrapError>,
}

impl SystemTraps {
    /// Builds traps that apply `policy` to unhandled faults.
    #[must_use]
    pub fn new(policy: FaultPolicy) -> Self {
        Self {
            policy,
            rejected_policy: None,
        }
    }

    /// Builds traps using the policy named by [`FAULT_POLICY_ENV_VAR`].
    ///
    /// An unknown value selects the default policy and is logged when the
    /// traps are installed.
    #[must_use]
    pub fn from_environment(env: &dyn Environment) -> Self {
        match FaultPolicy::from_environment(env) {
            Ok(policy) => Self::new(policy),
            Err(error) => Self {
                policy: FaultPolicy::default(),
                rejected_policy: Some(error),
            },
        }
    }

    /// Policy applied to unhandled faults.
    #[must_use]
    pub fn policy(&self) -> FaultPolicy {
        self.policy
    }
}

impl TrapInstaller for SystemTraps {
    fn install(
        &self,
        context: &LifecycleContext,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> Result<TrapRegistration, TrapError> {
        if let Some(error) = &self.rejected_policy {
            tracing::warn!(
                target: TRAPS_TARGET,
                error = %error,
                policy = %self.policy,
                "ignoring fault policy override"
            );
        }
        let mut signals =
            Signals::new(TERMINATION_SIGNALS).map_err(|source| TrapError::Install { source })?;
        let handle = signals.handle();
        let listener_context = context.clone();
        let listener_reporter = Arc::clone(&reporter);
        let listener = thread::Builder::new()
            .name("kinod-signals".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    dispatch_signal(&listener_context, &*listener_reporter, signal);
                }
            })
            .map_err(|source| TrapError::Spawn { source })?;

        let hook_context = context.clone();
        let policy = self.policy;
        let previous_hook = Arc::new(panic::take_hook());
        let chained_hook = Arc::clone(&previous_hook);
        panic::set_hook(Box::new(move |info| {
            let report = FaultReport::from_hook(info, policy);
            dispatch_fault(&hook_context, &*reporter, &report);
            chained_hook(info);
        }));

        Ok(TrapRegistration {
            signals: Some((handle, listener)),
            previous_hook: Some(previous_hook),
        })
    }
}

/// Reports `signal` and requests shutdown on its behalf.
///
/// Returns whether this signal performed the shutdown transition.
pub fn dispatch_signal(
    context: &LifecycleContext,
    reporter: &dyn LifecycleReporter,
    signal: i32,
) -> bool {
    reporter.signal_received(signal);
    request_or_report(context, reporter, ShutdownTrigger::Signal(signal))
}

/// Reports a fault and, under [`FaultPolicy::Shutdown`], requests shutdown.
///
/// Returns whether this fault performed the shutdown transition.
pub fn dispatch_fault(
    context: &LifecycleContext,
    reporter: &dyn LifecycleReporter,
    report: &FaultReport,
) -> bool {
    reporter.fault(report);
    match report.policy {
        FaultPolicy::Log => false,
        FaultPolicy::Shutdown => request_or_report(context, reporter, ShutdownTrigger::Fault),
    }
}

fn request_or_report(
    context: &LifecycleContext,
    reporter: &dyn LifecycleReporter,
    trigger: ShutdownTrigger,
) -> bool {
    let accepted = context.request(trigger);
    if !accepted {
        reporter.trigger_ignored(trigger);
    }
    accepted
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rstest::rstest;

    use kino_config::StaticEnvironment;

    use super::*;
    use crate::tests::support::{LifecycleEvent, RecordingLifecycleReporter, process_traps_lock};

    fn report(policy: FaultPolicy) -> FaultReport {
        FaultReport {
            message: "boom".to_owned(),
            location: Some("src/host.rs:10:5".to_owned()),
            thread: Some("worker".to_owned()),
            policy,
        }
    }

    #[rstest]
    #[case::unset(None, FaultPolicy::Log)]
    #[case::empty(Some(""), FaultPolicy::Log)]
    #[case::log(Some("log"), FaultPolicy::Log)]
    #[case::shutdown(Some("Shutdown"), FaultPolicy::Shutdown)]
    #[case::padded(Some(" shutdown "), FaultPolicy::Shutdown)]
    fn fault_policy_reads_environment(#[case] value: Option<&str>, #[case] expected: FaultPolicy) {
        let env = match value {
            Some(value) => StaticEnvironment::new().with(FAULT_POLICY_ENV_VAR, value),
            None => StaticEnvironment::new(),
        };
        assert_eq!(
            FaultPolicy::from_environment(&env).expect("policy should parse"),
            expected
        );
    }

    #[test]
    fn unknown_fault_policy_is_rejected() {
        let env = StaticEnvironment::new().with(FAULT_POLICY_ENV_VAR, "explode");
        let error = FaultPolicy::from_environment(&env).expect_err("value should be rejected");
        assert!(matches!(error, TrapError::FaultPolicy { ref value } if value == "explode"));
    }

    #[test]
    fn system_traps_default_unknown_policies() {
        let env = StaticEnvironment::new().with(FAULT_POLICY_ENV_VAR, "explode");
        assert_eq!(SystemTraps::from_environment(&env).policy(), FaultPolicy::Log);
        let env = StaticEnvironment::new().with(FAULT_POLICY_ENV_VAR, "shutdown");
        assert_eq!(
            SystemTraps::from_environment(&env).policy(),
            FaultPolicy::Shutdown
        );
    }

    #[test]
    fn signal_requests_shutdown_once() {
        let context = LifecycleContext::new();
        let reporter = RecordingLifecycleReporter::default();
        assert!(dispatch_signal(&context, &reporter, SIGINT));
        assert!(!dispatch_signal(&context, &reporter, SIGTERM));
        assert_eq!(context.wait().exit_code(), 130);
        assert_eq!(
            reporter.events(),
            vec![
                LifecycleEvent::SignalReceived(SIGINT),
                LifecycleEvent::SignalReceived(SIGTERM),
                LifecycleEvent::TriggerIgnored(ShutdownTrigger::Signal(SIGTERM)),
            ]
        );
    }

    #[test]
    fn logged_faults_keep_running() {
        let context = LifecycleContext::new();
        let reporter = RecordingLifecycleReporter::default();
        assert!(!dispatch_fault(&context, &reporter, &report(FaultPolicy::Log)));
        assert!(!context.is_shutdown_requested());
        assert_eq!(
            reporter.events(),
            vec![LifecycleEvent::Fault("boom".to_owned())]
        );
    }

    #[test]
    fn shutdown_policy_requests_exit_code_one() {
        let context = LifecycleContext::new();
        let reporter = RecordingLifecycleReporter::default();
        assert!(dispatch_fault(
            &context,
            &reporter,
            &report(FaultPolicy::Shutdown)
        ));
        let request = context.wait();
        assert_eq!(request.trigger, ShutdownTrigger::Fault);
        assert_eq!(request.exit_code(), 1);
        assert!(!request.restart);
    }

    #[test]
    fn inert_registration_drops_cleanly() {
        let registration = TrapRegistration::inert();
        assert!(!registration.listens_for_signals());
        assert!(!registration.owns_panic_hook());
        drop(registration);
    }

    #[test]
    fn system_traps_chain_to_and_restore_the_previous_hook() {
        let _lock = process_traps_lock();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        panic::set_hook(Box::new(move |info| {
            let message = FaultReport::from_hook(info, FaultPolicy::Log).message;
            if let Ok(mut seen) = recorder.lock() {
                seen.push(message);
            }
        }));
        let reporter = Arc::new(RecordingLifecycleReporter::default());
        let registration = SystemTraps::new(FaultPolicy::Log)
            .install(&LifecycleContext::new(), reporter.clone())
            .expect("traps should install");
        assert!(registration.listens_for_signals());
        assert!(registration.owns_panic_hook());

        assert!(panic::catch_unwind::<_, ()>(|| panic!("while trapped")).is_err());
        drop(registration);
        assert!(panic::catch_unwind::<_, ()>(|| panic!("after teardown")).is_err());
        drop(panic::take_hook());

        let seen = seen.lock().expect("hook record poisoned").clone();
        assert!(seen.contains(&"while trapped".to_owned()));
        assert!(seen.contains(&"after teardown".to_owned()));
        let events = reporter.events();
        assert!(events.contains(&LifecycleEvent::Fault("while trapped".to_owned())));
        assert!(!events.contains(&LifecycleEvent::Fault("after teardown".to_owned())));
    }
}

//! Trap and telemetry installers that avoid process-wide state, plus the
//! lock taken by tests that install the real ones.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use kino_config::{ApplicationPaths, Environment};

use crate::health::LifecycleReporter;
use crate::launch::TelemetryInstaller;
use crate::lifecycle::{
    LifecycleContext, TrapError, TrapInstaller, TrapRegistration, dispatch_signal,
};
use crate::telemetry::TelemetryHandle;

static PROCESS_TRAPS: Mutex<()> = Mutex::new(());

/// Serialises tests that install [`crate::lifecycle::SystemTraps`], which
/// own the process panic hook and signal dispositions while installed.
pub fn process_traps_lock() -> MutexGuard<'static, ()> {
    PROCESS_TRAPS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Installs nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct InertTraps;

impl TrapInstaller for InertTraps {
    fn install(
        &self,
        _context: &LifecycleContext,
        _reporter: Arc<dyn LifecycleReporter>,
    ) -> Result<TrapRegistration, TrapError> {
        Ok(TrapRegistration::inert())
    }
}

/// Delivers the given signals while the traps are being installed, as if
/// they arrived during startup.
#[derive(Debug, Default, Clone)]
pub struct TriggeringTraps {
    signals: Vec<i32>,
}

impl TriggeringTraps {
    pub fn new(signals: impl IntoIterator<Item = i32>) -> Self {
        Self {
            signals: signals.into_iter().collect(),
        }
    }
}

impl TrapInstaller for TriggeringTraps {
    fn install(
        &self,
        context: &LifecycleContext,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> Result<TrapRegistration, TrapError> {
        for signal in &self.signals {
            dispatch_signal(context, &*reporter, *signal);
        }
        Ok(TrapRegistration::inert())
    }
}

/// Delivers one signal from a background thread after `delay`, normally
/// once the controller is already blocked.
#[derive(Debug, Clone, Copy)]
pub struct DelayedTraps {
    signal: i32,
    delay: Duration,
}

impl DelayedTraps {
    pub fn new(signal: i32, delay: Duration) -> Self {
        Self { signal, delay }
    }
}

impl TrapInstaller for DelayedTraps {
    fn install(
        &self,
        context: &LifecycleContext,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> Result<TrapRegistration, TrapError> {
        let context = context.clone();
        let Self { signal, delay } = *self;
        thread::spawn(move || {
            thread::sleep(delay);
            dispatch_signal(&context, &*reporter, signal);
        });
        Ok(TrapRegistration::inert())
    }
}

/// Fails as if signal registration had been refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingTraps;

impl TrapInstaller for FailingTraps {
    fn install(
        &self,
        _context: &LifecycleContext,
        _reporter: Arc<dyn LifecycleReporter>,
    ) -> Result<TrapRegistration, TrapError> {
        Err(TrapError::Install {
            source: io::Error::other("signal registration refused"),
        })
    }
}

/// Leaves the global subscriber alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTelemetry;

impl TelemetryInstaller for NoTelemetry {
    fn install(&self, _paths: &ApplicationPaths, _env: &dyn Environment) -> TelemetryHandle {
        TelemetryHandle::default()
    }
}

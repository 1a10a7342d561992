//! Scriptable application host that counts lifecycle calls.

use std::sync::{Arc, Mutex};
use std::thread;

use signal_hook::low_level;

use kino_config::{ApplicationPaths, StartupOptions};

use crate::host::{ApplicationHost, HostContext, HostError, HostFactory};
use crate::lifecycle::LifecycleContext;

/// What the host does when the controller drives it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostBehaviour {
    /// Starts and waits for an external trigger.
    #[default]
    Idle,
    /// The factory refuses to build the host.
    FailCreate,
    /// `initialize` returns an error.
    FailInitialize,
    /// `run_startup_tasks` returns an error.
    FailStartupTasks,
    /// Startup tasks request shutdown.
    RequestShutdown,
    /// Startup tasks request shutdown twice.
    RequestShutdownTwice,
    /// Startup tasks request a restart.
    RequestRestart,
    /// Startup tasks panic.
    PanicOnStartup,
    /// Startup tasks raise a real signal against the process.
    RaiseSignal(i32),
    /// Startup tasks join a worker thread that panics.
    PanicOnWorkerThread,
}

/// Counts of calls made against hosts built by one factory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostCalls {
    pub created: usize,
    pub initialized: usize,
    pub startup_tasks: usize,
    pub disposed: usize,
}

/// Shared view of the calls made against a [`RecordingHost`].
#[derive(Debug, Clone, Default)]
pub struct HostCallLog {
    calls: Arc<Mutex<HostCalls>>,
}

impl HostCallLog {
    /// Snapshot of the recorded calls.
    #[must_use]
    pub fn calls(&self) -> HostCalls {
        *self.calls.lock().expect("host call log mutex poisoned")
    }

    fn record(&self, update: impl FnOnce(&mut HostCalls)) {
        update(&mut self.calls.lock().expect("host call log mutex poisoned"));
    }
}

struct RecordingHost {
    behaviour: HostBehaviour,
    call_log: HostCallLog,
    lifecycle: Option<LifecycleContext>,
}

impl ApplicationHost for RecordingHost {
    fn initialize(&mut self, context: &HostContext) -> Result<(), HostError> {
        self.call_log.record(|calls| calls.initialized += 1);
        self.lifecycle = Some(context.lifecycle().clone());
        match self.behaviour {
            HostBehaviour::FailInitialize => Err(HostError::new("database unavailable")),
            _ => Ok(()),
        }
    }

    fn run_startup_tasks(&mut self) -> Result<(), HostError> {
        self.call_log.record(|calls| calls.startup_tasks += 1);
        let lifecycle = self
            .lifecycle
            .as_ref()
            .expect("startup tasks run after initialize");
        match self.behaviour {
            HostBehaviour::FailStartupTasks => {
                return Err(HostError::new("migration failed"));
            }
            HostBehaviour::RequestShutdown => {
                lifecycle.request_shutdown();
            }
            HostBehaviour::RequestShutdownTwice => {
                lifecycle.request_shutdown();
                lifecycle.request_shutdown();
            }
            HostBehaviour::RequestRestart => {
                lifecycle.request_restart();
            }
            HostBehaviour::PanicOnStartup => panic!("startup task exploded"),
            HostBehaviour::RaiseSignal(signal) => {
                low_level::raise(signal)
                    .map_err(|error| HostError::with_source("raise failed", error))?;
            }
            HostBehaviour::PanicOnWorkerThread => {
                let worker = thread::Builder::new()
                    .name("transcode-worker".to_owned())
                    .spawn::<_, ()>(|| panic!("worker exploded"))
                    .expect("spawn worker thread");
                assert!(worker.join().is_err(), "worker should have panicked");
            }
            HostBehaviour::Idle | HostBehaviour::FailCreate | HostBehaviour::FailInitialize => {}
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.call_log.record(|calls| calls.disposed += 1);
    }
}

/// Factory building [`RecordingHost`]s that record into one call log.
#[derive(Debug, Clone, Default)]
pub struct RecordingHostFactory {
    behaviour: HostBehaviour,
    call_log: HostCallLog,
}

impl RecordingHostFactory {
    /// Builds a factory whose hosts follow `behaviour`.
    #[must_use]
    pub fn new(behaviour: HostBehaviour) -> Self {
        Self {
            behaviour,
            call_log: HostCallLog::default(),
        }
    }

    /// Call log shared with every host this factory builds.
    #[must_use]
    pub fn call_log(&self) -> HostCallLog {
        self.call_log.clone()
    }
}

impl HostFactory for RecordingHostFactory {
    fn create(
        &self,
        _paths: &ApplicationPaths,
        _options: &StartupOptions,
    ) -> Result<Box<dyn ApplicationHost>, HostError> {
        if self.behaviour == HostBehaviour::FailCreate {
            return Err(HostError::new("host factory unavailable"));
        }
        self.call_log.record(|calls| calls.created += 1);
        Ok(Box::new(RecordingHost {
            behaviour: self.behaviour,
            call_log: self.call_log.clone(),
            lifecycle: None,
        }))
    }
}

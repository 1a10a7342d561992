//! BDD test world: assembles a launch plan from test doubles and records the
//! result of running it.

use std::cell::RefCell;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rstest::fixture;
use tempfile::TempDir;

use kino_config::{DATA_PATH_ENV_VAR, StaticEnvironment};

use crate::launch::{LaunchError, LaunchPlan, launch_with};
use crate::lifecycle::TrapInstaller;
use crate::restart::{ProcessSpawner, RestartError, RestartPlan};

use super::host::{HostBehaviour, HostCalls, RecordingHostFactory};
use super::reporter::RecordingLifecycleReporter;
use super::traps::{InertTraps, NoTelemetry, TriggeringTraps};

/// Spawner that records plans instead of starting processes.
#[derive(Debug, Default)]
pub struct RecordingSpawner {
    plans: Mutex<Vec<RestartPlan>>,
    fail: bool,
}

impl RecordingSpawner {
    /// Builds a spawner whose every spawn fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            plans: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Plans handed to the spawner so far.
    #[must_use]
    pub fn plans(&self) -> Vec<RestartPlan> {
        self.plans.lock().expect("spawner mutex poisoned").clone()
    }
}

impl ProcessSpawner for RecordingSpawner {
    fn spawn(&self, plan: &RestartPlan) -> Result<(), RestartError> {
        self.plans
            .lock()
            .expect("spawner mutex poisoned")
            .push(plan.clone());
        if self.fail {
            return Err(RestartError::Spawn {
                executable: plan.executable().to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "spawn refused"),
            });
        }
        Ok(())
    }
}

/// Scenario world shared across BDD steps.
pub struct LifecycleWorld {
    temp_dir: TempDir,
    args: Vec<OsString>,
    signals: Vec<i32>,
    behaviour: HostBehaviour,
    spawner: RecordingSpawner,
    pub reporter: Arc<RecordingLifecycleReporter>,
    host_calls: Option<HostCalls>,
    output: Vec<u8>,
    result: Option<Result<i32, LaunchError>>,
}

impl LifecycleWorld {
    /// Builds a world that runs `kinod` with no arguments.
    #[must_use]
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temporary directory"),
            args: vec![OsString::from("kinod")],
            signals: Vec::new(),
            behaviour: HostBehaviour::Idle,
            spawner: RecordingSpawner::default(),
            reporter: Arc::new(RecordingLifecycleReporter::default()),
            host_calls: None,
            output: Vec::new(),
            result: None,
        }
    }

    /// Path under the scenario's scratch directory.
    #[must_use]
    pub fn scratch(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join(relative)
    }

    /// Appends raw command-line arguments.
    pub fn push_args<I, T>(&mut self, args: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
    }

    /// Queues a signal delivered while traps are installed.
    pub fn deliver_signal(&mut self, signal: i32) {
        self.signals.push(signal);
    }

    /// Selects how the host behaves.
    pub fn use_host(&mut self, behaviour: HostBehaviour) {
        self.behaviour = behaviour;
    }

    /// Makes every restart spawn fail.
    pub fn use_failing_spawner(&mut self) {
        self.spawner = RecordingSpawner::failing();
    }

    /// Runs the launch sequence once.
    pub fn launch(&mut self) {
        if self.result.is_some() {
            return;
        }
        let environment =
            StaticEnvironment::new().with(DATA_PATH_ENV_VAR, self.scratch("data"));
        let hosts = RecordingHostFactory::new(self.behaviour);
        let triggering = TriggeringTraps::new(self.signals.clone());
        let traps: &dyn TrapInstaller = if self.signals.is_empty() {
            &InertTraps
        } else {
            &triggering
        };
        let plan = LaunchPlan {
            environment: &environment,
            telemetry: &NoTelemetry,
            traps,
            hosts: &hosts,
            spawner: &self.spawner,
            reporter: self.reporter.clone(),
        };
        let mut output = Vec::new();
        let result = launch_with(self.args.clone(), &mut output, &plan);
        self.output = output;
        self.host_calls = Some(hosts.call_log().calls());
        self.result = Some(result);
    }

    /// Result of the launch, if it ran.
    #[must_use]
    pub fn result(&self) -> Option<&Result<i32, LaunchError>> {
        self.result.as_ref()
    }

    /// Calls made against the host during the launch.
    #[must_use]
    pub fn host_calls(&self) -> HostCalls {
        self.host_calls.unwrap_or_default()
    }

    /// Text written to standard output.
    #[must_use]
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Plans handed to the spawner.
    #[must_use]
    pub fn restart_plans(&self) -> Vec<RestartPlan> {
        self.spawner.plans()
    }
}

impl Default for LifecycleWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test world fixture.
#[fixture]
pub fn world() -> RefCell<LifecycleWorld> {
    RefCell::new(LifecycleWorld::new())
}

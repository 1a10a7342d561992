//! Process lifecycle controller for the Kino media server.
//!
//! The crate takes the server process from startup to exit. Startup parses
//! the command line, resolves the application directories through
//! [`kino_config`], and installs structured telemetry, falling back to
//! console and daily-file logging when `logging.json` is unusable. The
//! [`LifecycleController`] then installs signal and panic traps, starts the
//! [`ApplicationHost`], and blocks on the one-shot [`LifecycleContext`] until
//! a trigger fires.
//!
//! ## Shutdown and restart
//!
//! SIGINT, SIGTERM, and SIGQUIT, a host-requested shutdown or restart, and
//! (under the `shutdown` fault policy) an unhandled panic all feed the same
//! context. The first trigger wins; later ones are logged and ignored. The
//! host is disposed exactly once on every path, including failed startup and
//! unwinding. When a restart was requested the [`restart`] launcher spawns the
//! replacement process before this one exits.

mod health;
mod host;
pub mod launch;
pub mod lifecycle;
mod placeholder_host;
pub mod restart;
pub mod telemetry;

pub use health::{LifecycleReporter, StructuredLifecycleReporter};
pub use host::{ApplicationHost, HostContext, HostError, HostFactory};
pub use launch::{
    GlobalTelemetry, LaunchError, LaunchPlan, TelemetryInstaller, launch_with, run, run_with,
};
pub use lifecycle::{
    FaultPolicy, LifecycleContext, LifecycleController, LifecycleError, LifecycleState,
    RunOutcome, ShutdownRequest, ShutdownTrigger, SystemTraps, TrapInstaller,
};
pub use restart::{ProcessSpawner, RestartError, RestartPlan, SystemSpawner};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;

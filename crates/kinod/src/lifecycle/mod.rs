//! Process lifecycle: the shared shutdown signal, the traps that feed it,
//! and the controller that runs the application host.

mod context;
mod controller;
mod errors;
mod state;
mod traps;

pub(crate) use context::signal_name;
pub use context::{LifecycleContext, ShutdownRequest, ShutdownTrigger};
pub use controller::{LifecycleController, RunOutcome};
pub use errors::LifecycleError;
pub use state::LifecycleState;
pub use traps::{
    FaultPolicy, FaultReport, SystemTraps, TERMINATION_SIGNALS, TrapError, TrapInstaller,
    TrapRegistration, dispatch_fault, dispatch_signal,
};

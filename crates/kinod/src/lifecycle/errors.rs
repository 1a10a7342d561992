use thiserror::Error;

use crate::host::HostError;

use super::state::LifecycleState;
use super::traps::TrapError;

/// Errors that end a lifecycle run before the host reaches `Running`.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Signal or fault traps could not be installed.
    #[error("failed to install lifecycle traps: {source}")]
    Traps {
        /// Underlying trap error.
        #[source]
        source: TrapError,
    },
    /// The host factory could not build the application host.
    #[error("failed to create the application host: {source}")]
    HostCreate {
        /// Error reported by the factory.
        #[source]
        source: HostError,
    },
    /// The host failed to initialise.
    #[error("application host failed to initialise: {source}")]
    Initialize {
        /// Error reported by the host.
        #[source]
        source: HostError,
    },
    /// The host's startup tasks failed.
    #[error("application host startup tasks failed: {source}")]
    StartupTasks {
        /// Error reported by the host.
        #[source]
        source: HostError,
    },
    /// The controller attempted a transition the state machine forbids.
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        /// State before the attempted move.
        from: LifecycleState,
        /// Rejected target state.
        to: LifecycleState,
    },
}

//! Process lifecycle states and the transitions between them.

use strum::{Display, IntoStaticStr};

use super::errors::LifecycleError;

/// Phase of the server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    /// Traps are being installed and the host initialised.
    Starting,
    /// Startup finished; the main thread is blocked on the shutdown signal.
    Running,
    /// A trigger fired or startup failed; the host is being torn down.
    ShuttingDown,
    /// The host has been disposed.
    Disposed,
    /// The process is about to exit.
    Exiting,
    /// A replacement process is about to be launched.
    Restarting,
}

impl LifecycleState {
    /// Whether the machine may move from `self` to `next`.
    ///
    /// `Starting` may skip `Running` when startup fails.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Starting, Self::Running | Self::ShuttingDown)
                | (Self::Running, Self::ShuttingDown)
                | (Self::ShuttingDown, Self::Disposed)
                | (Self::Disposed, Self::Exiting | Self::Restarting)
        )
    }

    /// Moves to `next`, rejecting transitions the machine does not allow.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] for a disallowed move.
    pub fn transition(self, next: Self) -> Result<Self, LifecycleError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(LifecycleError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Whether no further transitions exist.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exiting | Self::Restarting)
    }
}

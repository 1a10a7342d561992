//! One-shot shutdown state shared by traps, the host, and the main thread.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};

/// What caused the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// A POSIX signal with the given number.
    Signal(i32),
    /// The application host asked to stop.
    HostRequested,
    /// The application host asked to stop and be relaunched.
    RestartRequested,
    /// An unhandled fault under the shutdown fault policy.
    Fault,
}

impl ShutdownTrigger {
    /// Process exit code associated with the trigger.
    ///
    /// Signals follow the shell convention of `128 + signal`.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Signal(signal) => 128 + signal,
            Self::HostRequested | Self::RestartRequested => 0,
            Self::Fault => 1,
        }
    }
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(signal) => match signal_name(*signal) {
                Some(name) => write!(f, "{name}"),
                None => write!(f, "signal {signal}"),
            },
            Self::HostRequested => f.write_str("host request"),
            Self::RestartRequested => f.write_str("restart request"),
            Self::Fault => f.write_str("unhandled fault"),
        }
    }
}

pub(crate) fn signal_name(signal: i32) -> Option<&'static str> {
    match signal {
        SIGINT => Some("SIGINT"),
        SIGTERM => Some("SIGTERM"),
        SIGQUIT => Some("SIGQUIT"),
        SIGHUP => Some("SIGHUP"),
        _ => None,
    }
}

/// Snapshot returned once shutdown has been requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownRequest {
    /// The first trigger that fired.
    pub trigger: ShutdownTrigger,
    /// Whether a replacement process should be started after disposal.
    pub restart: bool,
}

impl ShutdownRequest {
    /// Exit code the process should finish with.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.trigger.exit_code()
    }
}

/// Cloneable handle over the process lifecycle state.
///
/// Shutdown is monotonic: the first request records its trigger and wakes
/// every waiter, and all later requests are ignored. Clones share the same
/// state, so a context can be handed to signal listeners, the panic hook, and
/// the application host while the main thread waits on it.
#[derive(Debug, Clone, Default)]
pub struct LifecycleContext {
    inner: Arc<(Mutex<Option<ShutdownRequest>>, Condvar)>,
}

impl LifecycleContext {
    /// Builds a context with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown on behalf of `trigger`.
    ///
    /// Returns `true` when this call performed the transition and `false`
    /// when shutdown had already been requested.
    pub fn request(&self, trigger: ShutdownTrigger) -> bool {
        self.transition(ShutdownRequest {
            trigger,
            restart: false,
        })
    }

    /// Requests a plain shutdown from the application host.
    pub fn request_shutdown(&self) -> bool {
        self.request(ShutdownTrigger::HostRequested)
    }

    /// Records the restart intent and requests shutdown.
    ///
    /// Ignored, like any other request, once shutdown is under way.
    pub fn request_restart(&self) -> bool {
        self.transition(ShutdownRequest {
            trigger: ShutdownTrigger::RestartRequested,
            restart: true,
        })
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.state().is_some()
    }

    /// The recorded request, if shutdown has been requested.
    #[must_use]
    pub fn current(&self) -> Option<ShutdownRequest> {
        *self.state()
    }

    /// Blocks the calling thread until shutdown is requested.
    ///
    /// Returns immediately when a request was recorded before the call.
    #[must_use]
    pub fn wait(&self) -> ShutdownRequest {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(request) = *state {
                return request;
            }
            state = cvar.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn transition(&self, request: ShutdownRequest) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_some() {
            return false;
        }
        *state = Some(request);
        cvar.notify_all();
        true
    }

    fn state(&self) -> MutexGuard<'_, Option<ShutdownRequest>> {
        let (lock, _) = &*self.inner;
        lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

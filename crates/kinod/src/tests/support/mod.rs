//! Test doubles shared by the lifecycle unit and behavioural suites.

mod host;
mod lifecycle_world;
mod reporter;
mod traps;

pub use host::{HostBehaviour, HostCalls, HostCallLog, RecordingHostFactory};
pub use lifecycle_world::{LifecycleWorld, RecordingSpawner, world};
pub use reporter::{LifecycleEvent, RecordingLifecycleReporter};
pub use traps::{
    DelayedTraps, FailingTraps, InertTraps, NoTelemetry, TriggeringTraps, process_traps_lock,
};

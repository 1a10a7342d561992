//! Placeholder application host used until the media services are wired in.

use kino_config::{ApplicationPaths, StartupOptions};

use crate::host::{ApplicationHost, HostContext, HostError};

const HOST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::host::idle");

/// Host that logs each lifecycle call without starting real services.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct IdleHost;

impl IdleHost {
    /// Factory entry point matching [`crate::HostFactory`].
    pub(crate) fn create(
        _paths: &ApplicationPaths,
        _options: &StartupOptions,
    ) -> Result<Box<dyn ApplicationHost>, HostError> {
        Ok(Box::new(Self))
    }
}

impl ApplicationHost for IdleHost {
    fn initialize(&mut self, context: &HostContext) -> Result<(), HostError> {
        let options = context.options();
        tracing::info!(
            target: HOST_TARGET,
            service = options.is_service(),
            autorun_web_app = !options.no_autorun_web_app(),
            ffmpeg = ?options.ffmpeg_tools().map(|(ffmpeg, _)| ffmpeg),
            package = options.package().unwrap_or("none"),
            "host initialised but media services are not yet implemented"
        );
        Ok(())
    }

    fn run_startup_tasks(&mut self) -> Result<(), HostError> {
        tracing::debug!(target: HOST_TARGET, "no startup tasks to run");
        Ok(())
    }

    fn dispose(&mut self) {
        tracing::debug!(target: HOST_TARGET, "nothing to dispose");
    }
}

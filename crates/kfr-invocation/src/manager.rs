//! InvocationManager - composes the runner, the modal wait and the bridge.

use crate::bridge::CompletionBridge;
use crate::report::InvocationReport;
use kfr_common::{CommandLine, Error, Result};
use kfr_process_runner::{ProcessRunner, RunnerConfig};
use kfr_progress::{ModalResult, ModalWait, ProgressSurface};
use std::time::Duration;
use tracing::{info, warn};

/// Default bound on the final join after the modal wait closes.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle timing.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Graceful-exit window after a terminate request
    pub grace_window: Duration,
    /// How long to wait for the runner once the modal wait has closed
    pub join_timeout: Duration,
}

impl LifecycleConfig {
    /// The join bound has to cover the grace window, otherwise a cancelled
    /// child that ignores the graceful signal would outlive the join.
    pub fn validate(&self) -> Result<()> {
        if self.join_timeout.is_zero() {
            return Err(Error::validation("Join timeout must be greater than 0"));
        }
        if self.join_timeout < self.grace_window {
            return Err(Error::validation(format!(
                "Join timeout ({:?}) must not be shorter than the grace window ({:?})",
                self.join_timeout, self.grace_window
            )));
        }
        Ok(())
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            grace_window: kfr_process_runner::runner::DEFAULT_GRACE_WINDOW,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}

/// Runs external programs under a modal wait on the calling thread.
#[derive(Debug, Clone)]
pub struct InvocationManager {
    runner: ProcessRunner,
    config: LifecycleConfig,
}

impl InvocationManager {
    pub fn new(config: LifecycleConfig) -> Self {
        let runner = ProcessRunner::new(RunnerConfig {
            grace_window: config.grace_window,
            ..RunnerConfig::default()
        });
        Self { runner, config }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Run `command`, blocking the calling thread in a modal wait shown on
    /// `surface` until the program finishes or the user cancels.
    ///
    /// The runner is always joined before this returns, within the
    /// configured bound. Must be called from a thread that is not inside an
    /// async runtime.
    pub fn invoke(
        &self,
        command: CommandLine,
        message: &str,
        surface: &mut dyn ProgressSurface,
    ) -> Result<InvocationReport> {
        self.config.validate()?;
        let wait = ModalWait::new(message);
        let bridge = CompletionBridge::new(&wait);

        let handle = self.runner.start(command.clone(), bridge.into_callback())?;
        let id = handle.id().clone();
        info!(invocation = %id, command = %command, "Invocation started");

        let modal_result = match wait.show_modal(surface) {
            Ok(result) => result,
            Err(e) => {
                warn!(invocation = %id, error = %e, "Modal wait failed, stopping invocation");
                handle.terminate();
                if let Err(join_err) = handle.join(self.config.join_timeout) {
                    warn!(invocation = %id, error = %join_err, "Cleanup join failed");
                }
                return Err(e.into());
            }
        };

        if modal_result == ModalResult::CancelRequested {
            info!(invocation = %id, "Cancelling invocation");
            handle.terminate();
        }

        let invocation = handle.join(self.config.join_timeout)?;
        let report = InvocationReport::new(invocation, modal_result);

        info!(
            invocation = %id,
            outcome = report.outcome().name(),
            "Invocation finished"
        );
        Ok(report)
    }
}

impl Default for InvocationManager {
    fn default() -> Self {
        Self::new(LifecycleConfig::default())
    }
}

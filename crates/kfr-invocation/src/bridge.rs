//! Completion Bridge - the only path from a runner thread to the owner
//! thread.

use kfr_process_runner::ProcessInvocation;
use kfr_progress::{ModalEnder, ModalResult, ModalWait, OwnerHandle};
use tracing::debug;

/// Ends the modal wait when the process finishes.
///
/// Runs on the runner thread, but touches nothing there: it posts a job to
/// the owner thread, and that job calls the same idempotent end action a
/// cancel uses. Whichever reaches it first wins.
#[derive(Debug, Clone)]
pub struct CompletionBridge {
    owner: OwnerHandle,
    ender: ModalEnder,
}

impl CompletionBridge {
    pub fn new(wait: &ModalWait) -> Self {
        Self {
            owner: wait.owner_handle(),
            ender: wait.ender(),
        }
    }

    /// Notify the owner thread that `invocation` is final.
    pub fn notify(self, invocation: &ProcessInvocation) {
        debug!(
            invocation = %invocation.id(),
            outcome = invocation.outcome().name(),
            "Process finished, notifying owner thread"
        );

        let ender = self.ender;
        let posted = self.owner.post(move || {
            ender.end(ModalResult::WorkFinished);
        });
        if !posted {
            debug!(invocation = %invocation.id(), "Owner thread no longer waiting");
        }
    }

    /// The bridge as a runner completion callback.
    pub fn into_callback(self) -> impl FnOnce(&ProcessInvocation) + Send + 'static {
        move |invocation| self.notify(invocation)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use kfr_common::CommandLine;
    use kfr_process_runner::ProcessRunner;
    use kfr_progress::HeadlessSurface;
    use std::time::Duration;

    #[test]
    fn test_completion_ends_modal_wait() {
        let wait = ModalWait::new("echo");
        let bridge = CompletionBridge::new(&wait);
        let handle = ProcessRunner::default()
            .start(CommandLine::new(["echo", "hi"]).unwrap(), bridge.into_callback())
            .unwrap();

        let mut surface = HeadlessSurface::new();
        let result = wait.show_modal(&mut surface).unwrap();

        assert_eq!(result, ModalResult::WorkFinished);
        assert!(handle.join(Duration::from_secs(5)).unwrap().outcome().is_success());
    }

    #[test]
    fn test_completion_after_cancel_has_no_effect() {
        let wait = ModalWait::new("sleep");
        let cancel = wait.cancel_action();
        let bridge = CompletionBridge::new(&wait);
        let handle = ProcessRunner::default()
            .start(CommandLine::new(["sleep", "30"]).unwrap(), bridge.into_callback())
            .unwrap();

        assert!(cancel.trigger());
        let mut surface = HeadlessSurface::new();
        let result = wait.show_modal(&mut surface).unwrap();
        assert_eq!(result, ModalResult::CancelRequested);

        // The bridge fires after the wait is gone; nothing is left to end.
        handle.terminate();
        handle.join(Duration::from_secs(10)).unwrap();
        assert_eq!(surface.close_count(), 1);
        assert_eq!(surface.last_result(), Some(ModalResult::CancelRequested));
    }
}

//! What one invocation amounted to, from the caller's point of view.

use kfr_common::{InvocationError, InvocationResult};
use kfr_process_runner::{InvocationOutcome, ProcessInvocation};
use kfr_progress::ModalResult;

/// Final report of a managed invocation.
#[derive(Debug, Clone)]
pub struct InvocationReport {
    invocation: ProcessInvocation,
    modal_result: ModalResult,
    outcome: InvocationOutcome,
}

impl InvocationReport {
    /// Combine the finished invocation with the reason the wait ended.
    ///
    /// A launch failure is reported as such even if the user also hit
    /// cancel. Otherwise a cancel request makes the outcome `Cancelled`, even
    /// when the process happened to exit on its own in the meantime.
    pub fn new(invocation: ProcessInvocation, modal_result: ModalResult) -> Self {
        let outcome = match (invocation.outcome(), modal_result) {
            (failed @ InvocationOutcome::LaunchFailed(_), _) => failed,
            (_, ModalResult::CancelRequested) => InvocationOutcome::Cancelled,
            (outcome, ModalResult::WorkFinished) => outcome,
        };
        Self {
            invocation,
            modal_result,
            outcome,
        }
    }

    pub fn outcome(&self) -> &InvocationOutcome {
        &self.outcome
    }

    pub fn invocation(&self) -> &ProcessInvocation {
        &self.invocation
    }

    pub fn modal_result(&self) -> ModalResult {
        self.modal_result
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, InvocationOutcome::Cancelled)
    }

    /// Map the outcome onto the error taxonomy.
    ///
    /// `Ok(Some(_))` for a zero exit, `Ok(None)` for a cancel (not an
    /// error), `Err` for a launch failure or any other exit.
    pub fn into_result(self) -> InvocationResult<Option<ProcessInvocation>> {
        match self.outcome {
            InvocationOutcome::Completed(Some(0)) => Ok(Some(self.invocation)),
            InvocationOutcome::Completed(exit_code) => Err(InvocationError::non_zero_exit(
                self.invocation.id().clone(),
                exit_code,
                self.invocation.stdout_lossy(),
                self.invocation.stderr_lossy(),
            )),
            InvocationOutcome::Cancelled => Ok(None),
            InvocationOutcome::LaunchFailed(err) => Err(err),
        }
    }

    /// User-facing description of a failure; `None` on success or cancel.
    pub fn failure_message(&self) -> Option<String> {
        let command = self.invocation.command();
        match &self.outcome {
            InvocationOutcome::Completed(Some(0)) | InvocationOutcome::Cancelled => None,
            InvocationOutcome::LaunchFailed(err) => Some(format!(
                "Process failure:\n---\ncommand:\n{}\n---\nerror:\n{}",
                command, err
            )),
            InvocationOutcome::Completed(exit_code) => {
                let code = match (exit_code, self.invocation.signal()) {
                    (Some(code), _) => code.to_string(),
                    (None, Some(signal)) => format!("none (signal {})", signal),
                    (None, None) => "none".to_string(),
                };
                Some(format!(
                    "Program failure:\n---\ncommand:\n{}\n---\nexit code: {}\n--- stdout ---\n{}\n--- stderr ---\n{}",
                    command,
                    code,
                    self.invocation.stdout_lossy().trim_end(),
                    self.invocation.stderr_lossy().trim_end(),
                ))
            }
        }
    }
}

//! The record of one finished invocation and its outcome.

use chrono::{DateTime, Utc};
use kfr_common::{CommandLine, InvocationError, InvocationId};
use kfr_invocation_state::InvocationState;

/// Terminal outcome of an invocation. Exactly one is produced per run.
#[derive(Debug, Clone)]
pub enum InvocationOutcome {
    /// The program ran to its natural end. `None` when it was ended by a
    /// signal nobody in this process sent.
    Completed(Option<i32>),
    /// The invocation was terminated on request.
    Cancelled,
    /// The program could not be started.
    LaunchFailed(InvocationError),
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationOutcome::Completed(Some(0)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            InvocationOutcome::Completed(_) => "completed",
            InvocationOutcome::Cancelled => "cancelled",
            InvocationOutcome::LaunchFailed(_) => "launch_failed",
        }
    }
}

/// Everything the runner learned about one run of a program.
///
/// Built on the runner thread and published once, after the process has
/// ended; callers only ever see the finished value.
#[derive(Debug, Clone)]
pub struct ProcessInvocation {
    id: InvocationId,
    command: CommandLine,
    pid: Option<u32>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_code: Option<i32>,
    signal: Option<i32>,
    failure: Option<InvocationError>,
    terminated: bool,
    final_state: InvocationState,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl ProcessInvocation {
    pub(crate) fn new(id: InvocationId, command: CommandLine) -> Self {
        Self {
            id,
            command,
            pid: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: None,
            signal: None,
            failure: None,
            terminated: false,
            final_state: InvocationState::Idle,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn set_pid(&mut self, pid: u32) {
        self.pid = Some(pid);
    }

    pub(crate) fn set_output(&mut self, stdout: Vec<u8>, stderr: Vec<u8>) {
        self.stdout = stdout;
        self.stderr = stderr;
    }

    pub(crate) fn set_exit(&mut self, status: &std::process::ExitStatus) {
        self.exit_code = status.code();
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            self.signal = status.signal();
        }
    }

    pub(crate) fn set_failure(&mut self, failure: InvocationError) {
        self.failure = Some(failure);
    }

    pub(crate) fn mark_terminated(&mut self) {
        self.terminated = true;
    }

    pub(crate) fn finish(&mut self, state: InvocationState) {
        self.final_state = state;
        self.finished_at = Some(Utc::now());
    }

    pub fn id(&self) -> &InvocationId {
        &self.id
    }

    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Captured stdout. Only meaningful for a completed run.
    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    /// Captured stderr. Only meaningful for a completed run.
    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Terminating signal on Unix, if the child died from one.
    pub fn signal(&self) -> Option<i32> {
        self.signal
    }

    pub fn failure(&self) -> Option<&InvocationError> {
        self.failure.as_ref()
    }

    pub fn was_terminated(&self) -> bool {
        self.terminated
    }

    pub fn final_state(&self) -> InvocationState {
        self.final_state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Derive the terminal outcome.
    ///
    /// A launch failure wins over everything; an explicit terminate that
    /// actually stopped the child is `Cancelled`; anything else ran to its
    /// end.
    pub fn outcome(&self) -> InvocationOutcome {
        match (&self.failure, self.final_state) {
            (Some(err @ InvocationError::LaunchFailed { .. }), _) => {
                InvocationOutcome::LaunchFailed(err.clone())
            }
            (_, InvocationState::Killed) => InvocationOutcome::Cancelled,
            _ => InvocationOutcome::Completed(self.exit_code),
        }
    }
}

//! ProcessRunner - one background thread per invocation.
//!
//! The runner thread hosts a current-thread tokio runtime and owns the
//! `Child` for its whole life. The caller only ever holds a [`RunnerHandle`]:
//! it can request termination, read the current state, and join with a
//! bound. The finished [`ProcessInvocation`] crosses back exactly once.

use crate::capture::{drain_into, StreamType};
use crate::invocation::ProcessInvocation;
use kfr_common::{CommandLine, InvocationError, InvocationId, InvocationResult};
use kfr_invocation_state::{InvocationState, InvocationStateMachine};
use parking_lot::Mutex;
use std::process::{ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default time a child gets to exit after the termination signal.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(3);

/// How long to keep reading output after the child has exited. Grandchildren
/// that inherited the pipes can hold them open indefinitely.
pub const DEFAULT_DRAIN_LINGER: Duration = Duration::from_millis(250);

/// Time a runner gets to reap its child after a force kill issued by
/// [`RunnerHandle::join`].
pub const KILL_LATENCY: Duration = Duration::from_secs(2);

/// Runner options
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Time between the graceful signal and the force kill
    pub grace_window: Duration,
    /// Extra time to collect output once the child is gone
    pub drain_linger: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            grace_window: DEFAULT_GRACE_WINDOW,
            drain_linger: DEFAULT_DRAIN_LINGER,
        }
    }
}

/// Starts invocations.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    config: RunnerConfig,
}

impl ProcessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Start `command` on a fresh runner thread.
    ///
    /// `on_complete` runs exactly once on the runner thread after the
    /// invocation is final, whatever the outcome (exit, kill, launch
    /// failure). It must not block.
    pub fn start<F>(&self, command: CommandLine, on_complete: F) -> InvocationResult<RunnerHandle>
    where
        F: FnOnce(&ProcessInvocation) + Send + 'static,
    {
        let id = InvocationId::next();
        let cancel = CancellationToken::new();
        let slot = Arc::new(Mutex::new(RunnerSlot {
            machine: InvocationStateMachine::new(id.clone()),
            pid: None,
        }));
        let (done_tx, done_rx) = mpsc::sync_channel(1);

        let ctx = RunContext {
            id: id.clone(),
            command,
            config: self.config.clone(),
            cancel: cancel.clone(),
            slot: Arc::clone(&slot),
        };

        let thread = std::thread::Builder::new()
            .name(format!("kfr-runner-{}", id))
            .spawn(move || {
                let invocation = ctx.run();
                on_complete(&invocation);
                // Receiver gone means the caller stopped waiting.
                let _ = done_tx.send(invocation);
            })
            .map_err(|e| {
                InvocationError::io(id.clone(), format!("failed to spawn runner thread: {}", e))
            })?;

        debug!(invocation = %id, "Runner thread started");

        Ok(RunnerHandle {
            id,
            cancel,
            slot,
            done_rx,
            thread: Some(thread),
        })
    }
}

/// State visible to both sides. Written only by the runner thread.
struct RunnerSlot {
    machine: InvocationStateMachine,
    pid: Option<u32>,
}

/// Caller-side handle to a running invocation.
pub struct RunnerHandle {
    id: InvocationId,
    cancel: CancellationToken,
    slot: Arc<Mutex<RunnerSlot>>,
    done_rx: mpsc::Receiver<ProcessInvocation>,
    thread: Option<JoinHandle<()>>,
}

impl RunnerHandle {
    pub fn id(&self) -> &InvocationId {
        &self.id
    }

    pub fn state(&self) -> InvocationState {
        self.slot.lock().machine.current_state()
    }

    pub fn pid(&self) -> Option<u32> {
        self.slot.lock().pid
    }

    /// True once the runner thread has returned.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Request termination: graceful signal, grace window, then force kill.
    ///
    /// Returns immediately; the sequence runs on the runner thread. A no-op
    /// once the invocation is final.
    pub fn terminate(&self) {
        let state = self.state();
        if state.is_terminal() {
            debug!(invocation = %self.id, state = %state, "Terminate ignored, invocation already final");
            return;
        }
        if !self.cancel.is_cancelled() {
            info!(invocation = %self.id, state = %state, "Terminate requested");
            self.cancel.cancel();
        }
    }

    /// Wait at most `timeout` for the invocation to finish.
    ///
    /// On timeout the child is force-killed by PID and the runner gets a
    /// further [`KILL_LATENCY`] to reap it, so a terminated invocation still
    /// comes back as `Cancelled`. [`InvocationError::JoinTimeout`] is only
    /// returned when the runner is still busy after that.
    pub fn join(mut self, timeout: Duration) -> InvocationResult<ProcessInvocation> {
        let started = Instant::now();

        let received = match self.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    invocation = %self.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Runner did not finish in time, force killing"
                );
                self.cancel.cancel();
                if let Some(pid) = self.live_pid() {
                    if let Err(e) = kfr_process::force_kill(pid) {
                        if !e.is_gone() {
                            error!(invocation = %self.id, pid, error = %e, "Force kill after join timeout failed");
                        }
                    }
                }
                self.done_rx.recv_timeout(KILL_LATENCY)
            }
            other => other,
        };

        match received {
            Ok(invocation) => {
                if let Some(thread) = self.thread.take() {
                    // The result is the runner's last act, this returns promptly.
                    if thread.join().is_err() {
                        warn!(invocation = %self.id, "Runner thread panicked after publishing its result");
                    }
                }
                debug!(
                    invocation = %self.id,
                    outcome = invocation.outcome().name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Runner joined"
                );
                Ok(invocation)
            }
            Err(RecvTimeoutError::Timeout) => {
                error!(invocation = %self.id, "Runner still busy after force kill");
                Err(InvocationError::join_timeout(self.id.clone(), started.elapsed()))
            }
            Err(RecvTimeoutError::Disconnected) => {
                let message = match self.thread.take().map(|t| t.join()) {
                    Some(Err(payload)) => panic_message(payload.as_ref()),
                    _ => "runner exited without a result".to_string(),
                };
                error!(invocation = %self.id, message = %message, "Runner thread died");
                Err(InvocationError::runner_panicked(self.id.clone(), message))
            }
        }
    }

    fn live_pid(&self) -> Option<u32> {
        let slot = self.slot.lock();
        if slot.machine.current_state().is_active() {
            slot.pid
        } else {
            None
        }
    }
}

impl Drop for RunnerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() && !self.state().is_terminal() {
            debug!(invocation = %self.id, "Runner handle dropped early, terminating");
            self.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for RunnerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("pid", &self.pid())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

enum Exit {
    Natural(std::io::Result<ExitStatus>),
    TerminateRequested,
}

/// Everything the runner thread needs; moved onto it at start.
struct RunContext {
    id: InvocationId,
    command: CommandLine,
    config: RunnerConfig,
    cancel: CancellationToken,
    slot: Arc<Mutex<RunnerSlot>>,
}

impl RunContext {
    fn run(self) -> ProcessInvocation {
        let mut invocation = ProcessInvocation::new(self.id.clone(), self.command.clone());
        self.transition(|m| m.transition_to_launching());

        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.drive(&mut invocation)),
            Err(e) => {
                error!(invocation = %self.id, error = %e, "Failed to build runner runtime");
                invocation.set_failure(InvocationError::launch_failed(
                    self.id.clone(),
                    self.command.program(),
                    &e,
                ));
                self.transition(|m| m.transition_to_launch_failed(e.to_string()));
            }
        }

        invocation.finish(self.slot.lock().machine.current_state());
        invocation
    }

    async fn drive(&self, invocation: &mut ProcessInvocation) {
        if self.cancel.is_cancelled() {
            info!(invocation = %self.id, "Terminated before launch");
            invocation.mark_terminated();
            self.transition(|m| m.transition_to_killed("Terminated before launch".to_string()));
            return;
        }

        let mut cmd = Command::new(self.command.program());
        cmd.args(self.command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so Ctrl+Break reaches only this child.
        #[cfg(windows)]
        {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(
                    invocation = %self.id,
                    program = %self.command.program(),
                    error = %e,
                    "Failed to launch process"
                );
                invocation.set_failure(InvocationError::launch_failed(
                    self.id.clone(),
                    self.command.program(),
                    &e,
                ));
                self.transition(|m| m.transition_to_launch_failed(e.to_string()));
                return;
            }
        };

        let pid = child.id().unwrap_or(0);
        invocation.set_pid(pid);
        {
            let mut slot = self.slot.lock();
            slot.pid = Some(pid);
            if let Err(e) = slot.machine.transition_to_running(pid) {
                warn!(invocation = %self.id, error = %e, "Unexpected state transition failure");
            }
        }
        info!(invocation = %self.id, pid, command = %self.command, "Process spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();

        let (status, terminated) = {
            let drain = async {
                tokio::join!(
                    drain_into(stdout, &mut out_buf, StreamType::Stdout, &self.id),
                    drain_into(stderr, &mut err_buf, StreamType::Stderr, &self.id),
                )
            };
            tokio::pin!(drain);
            let mut drained = false;

            let exit = loop {
                tokio::select! {
                    status = child.wait() => break Exit::Natural(status),
                    _ = self.cancel.cancelled() => break Exit::TerminateRequested,
                    _ = &mut drain, if !drained => drained = true,
                }
            };

            let result = match exit {
                Exit::Natural(status) => {
                    // A signal death after a terminate request is that terminate.
                    let by_signal = matches!(&status, Ok(s) if s.code().is_none());
                    let terminated = by_signal && self.cancel.is_cancelled();
                    (status, terminated)
                }
                Exit::TerminateRequested => {
                    let shutdown =
                        terminate_child(&mut child, pid, self.config.grace_window, &self.id);
                    tokio::pin!(shutdown);
                    loop {
                        tokio::select! {
                            res = &mut shutdown => break res,
                            _ = &mut drain, if !drained => drained = true,
                        }
                    }
                }
            };

            if !drained
                && tokio::time::timeout(self.config.drain_linger, &mut drain)
                    .await
                    .is_err()
            {
                debug!(
                    invocation = %self.id,
                    "Output pipes still open after exit, keeping what was captured"
                );
            }

            result
        };

        invocation.set_output(out_buf, err_buf);

        match status {
            Ok(status) => {
                invocation.set_exit(&status);
                if terminated {
                    invocation.mark_terminated();
                    info!(invocation = %self.id, pid, status = %status, "Process terminated");
                    self.transition(|m| m.transition_to_killed(format!("Terminated ({})", status)));
                } else {
                    info!(invocation = %self.id, pid, exit_code = ?status.code(), "Process exited");
                    self.transition(|m| m.transition_to_completed(status.code()));
                }
            }
            Err(e) => {
                error!(invocation = %self.id, pid, error = %e, "Failed to wait for process");
                invocation.set_failure(InvocationError::io(self.id.clone(), e.to_string()));
                if terminated {
                    invocation.mark_terminated();
                    self.transition(|m| m.transition_to_killed(e.to_string()));
                } else {
                    self.transition(|m| m.transition_to_completed(None));
                }
            }
        }
    }

    fn transition<F>(&self, f: F)
    where
        F: FnOnce(&mut InvocationStateMachine) -> InvocationResult<()>,
    {
        if let Err(e) = f(&mut self.slot.lock().machine) {
            warn!(invocation = %self.id, error = %e, "Unexpected state transition failure");
        }
    }
}

/// Graceful signal, bounded wait, then force kill.
///
/// The returned flag is false when the child had already exited on its own
/// before any signal was sent. A child found dead by a signal counts as
/// terminated.
async fn terminate_child(
    child: &mut Child,
    pid: u32,
    grace: Duration,
    id: &InvocationId,
) -> (std::io::Result<ExitStatus>, bool) {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(invocation = %id, pid, "Process exited before terminate took effect");
            let by_signal = status.code().is_none();
            return (Ok(status), by_signal);
        }
        Ok(None) => {}
        Err(e) => warn!(invocation = %id, pid, error = %e, "Failed to poll process before terminate"),
    }

    info!(
        invocation = %id,
        pid,
        grace_ms = grace.as_millis() as u64,
        "Sending termination signal"
    );
    match kfr_process::terminate_gracefully(pid) {
        Ok(()) => {
            if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                info!(invocation = %id, pid, "Process exited within grace window");
                return (status, true);
            }
            warn!(invocation = %id, pid, "Grace window elapsed, force killing");
        }
        Err(e) => {
            warn!(invocation = %id, pid, error = %e, "Termination signal failed, force killing");
        }
    }

    if let Err(e) = kfr_process::force_kill(pid) {
        warn!(invocation = %id, pid, error = %e, "Force kill by PID failed, using child handle");
        if let Err(e) = child.start_kill() {
            error!(invocation = %id, pid, error = %e, "Force kill failed");
        }
    }

    (child.wait().await, true)
}

use chrono::{DateTime, Utc};
use kfr_common::{InvocationError, InvocationId, InvocationResult};
use std::fmt;

const MAX_HISTORY: usize = 16;

/// Lifecycle state of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    /// Created, nothing spawned yet
    Idle,
    /// Spawn in progress
    Launching,
    /// Child is alive and its output is being drained
    Running,
    /// Child exited on its own (any exit code)
    Completed,
    /// Child was stopped by an explicit terminate
    Killed,
    /// Child could not be started
    LaunchFailed,
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationState::Idle => write!(f, "idle"),
            InvocationState::Launching => write!(f, "launching"),
            InvocationState::Running => write!(f, "running"),
            InvocationState::Completed => write!(f, "completed"),
            InvocationState::Killed => write!(f, "killed"),
            InvocationState::LaunchFailed => write!(f, "launch_failed"),
        }
    }
}

impl InvocationState {
    /// Terminal states have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvocationState::Completed | InvocationState::Killed | InvocationState::LaunchFailed
        )
    }

    /// True while a child process may exist.
    pub fn is_active(&self) -> bool {
        matches!(self, InvocationState::Launching | InvocationState::Running)
    }
}

/// A recorded transition with timestamp and optional reason
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from_state: InvocationState,
    pub to_state: InvocationState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// State machine guarding the `Idle → Launching → Running → terminal`
/// progression of a single invocation.
#[derive(Debug, Clone)]
pub struct InvocationStateMachine {
    invocation_id: InvocationId,
    current_state: InvocationState,
    state_history: Vec<StateTransition>,
    last_transition_time: DateTime<Utc>,
}

impl InvocationStateMachine {
    pub fn new(invocation_id: InvocationId) -> Self {
        Self {
            invocation_id,
            current_state: InvocationState::Idle,
            state_history: Vec::new(),
            last_transition_time: Utc::now(),
        }
    }

    pub fn current_state(&self) -> InvocationState {
        self.current_state
    }

    pub fn state_history(&self) -> &[StateTransition] {
        &self.state_history
    }

    pub fn last_transition_time(&self) -> DateTime<Utc> {
        self.last_transition_time
    }

    /// Check if a transition from the current state to `target` is valid.
    ///
    /// Unlike a long-lived process, an invocation never revisits a state, so
    /// self-transitions are rejected too.
    pub fn is_valid_transition(&self, target: InvocationState) -> bool {
        use InvocationState::*;

        matches!(
            (self.current_state, target),
            (Idle, Launching)
                | (Launching, Running)
                | (Launching, LaunchFailed)
                // terminate raced the spawn
                | (Launching, Killed)
                | (Running, Completed)
                | (Running, Killed)
        )
    }

    pub fn transition_to(
        &mut self,
        target: InvocationState,
        reason: Option<String>,
    ) -> InvocationResult<()> {
        if !self.is_valid_transition(target) {
            return Err(InvocationError::invalid_state(
                self.invocation_id.clone(),
                self.current_state.to_string(),
                target.to_string(),
            ));
        }

        let now = Utc::now();
        let from = self.current_state;
        self.state_history.push(StateTransition {
            from_state: from,
            to_state: target,
            timestamp: now,
            reason,
        });
        if self.state_history.len() > MAX_HISTORY {
            self.state_history.remove(0);
        }
        self.current_state = target;
        self.last_transition_time = now;

        tracing::debug!(
            invocation = %self.invocation_id,
            from = %from,
            to = %target,
            "Invocation state changed"
        );

        Ok(())
    }

    pub fn transition_to_launching(&mut self) -> InvocationResult<()> {
        self.transition_to(InvocationState::Launching, Some("Spawn requested".to_string()))
    }

    pub fn transition_to_running(&mut self, pid: u32) -> InvocationResult<()> {
        self.transition_to(InvocationState::Running, Some(format!("Spawned as PID {}", pid)))
    }

    pub fn transition_to_completed(&mut self, exit_code: Option<i32>) -> InvocationResult<()> {
        self.transition_to(
            InvocationState::Completed,
            Some(format!("Exited with code {:?}", exit_code)),
        )
    }

    pub fn transition_to_killed(&mut self, reason: String) -> InvocationResult<()> {
        self.transition_to(InvocationState::Killed, Some(reason))
    }

    pub fn transition_to_launch_failed(&mut self, reason: String) -> InvocationResult<()> {
        self.transition_to(InvocationState::LaunchFailed, Some(reason))
    }

    /// Time spent in the current state.
    pub fn time_in_current_state(&self) -> chrono::Duration {
        Utc::now() - self.last_transition_time
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.state_history.last()
    }
}

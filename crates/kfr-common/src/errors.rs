//! Error types for the KFR router runtime.
//!
//! Two layers live here:
//! - [`InvocationError`] describes how a single external-process invocation
//!   failed (launch, non-zero exit, termination, join).
//! - [`Error`] is the round-trip level error used by code that drives an
//!   invocation as one step of a larger job (export, route, import).
//!
//! Cancellation is deliberately absent from both: a user cancel is a normal
//! outcome, not an error.

use crate::types::InvocationId;
use thiserror::Error;

/// Result type alias for round-trip operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for invocation-level operations.
pub type InvocationResult<T> = std::result::Result<T, InvocationError>;

/// Why a program could not be launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchFailureKind {
    /// The executable does not exist (or is not on `PATH`).
    NotFound,
    /// The executable exists but may not be executed by this user.
    PermissionDenied,
    /// Any other spawn failure reported by the OS.
    Other,
}

impl LaunchFailureKind {
    /// Classify a spawn error.
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::PermissionDenied => "permission denied",
            Self::Other => "spawn error",
        }
    }
}

impl std::fmt::Display for LaunchFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invocation-level error taxonomy.
#[derive(Error, Debug, Clone)]
pub enum InvocationError {
    #[error("Launch failed: {id} - {program} ({kind}): {reason}")]
    LaunchFailed {
        id: InvocationId,
        program: String,
        kind: LaunchFailureKind,
        reason: String,
    },

    #[error("Program failed: {id} - exit code {exit_code:?}")]
    NonZeroExit {
        id: InvocationId,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Join timed out: {id} - runner still busy after {waited_ms}ms")]
    JoinTimeout { id: InvocationId, waited_ms: u64 },

    #[error("Invocation state error: {id} - cannot move from {from} to {to}")]
    InvalidState {
        id: InvocationId,
        from: String,
        to: String,
    },

    #[error("Modal wait used off its owner thread: {reason}")]
    OwnerThread { reason: String },

    #[error("Runner thread panicked: {id} - {message}")]
    RunnerPanicked { id: InvocationId, message: String },

    #[error("Invocation I/O error: {id} - {reason}")]
    Io { id: InvocationId, reason: String },
}

impl InvocationError {
    pub fn launch_failed(
        id: InvocationId,
        program: impl Into<String>,
        err: &std::io::Error,
    ) -> Self {
        Self::LaunchFailed {
            id,
            program: program.into(),
            kind: LaunchFailureKind::from_io(err),
            reason: err.to_string(),
        }
    }

    pub fn non_zero_exit(
        id: InvocationId,
        exit_code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::NonZeroExit {
            id,
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn join_timeout(id: InvocationId, waited: std::time::Duration) -> Self {
        Self::JoinTimeout {
            id,
            waited_ms: waited.as_millis() as u64,
        }
    }

    pub fn invalid_state(
        id: InvocationId,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            id,
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn owner_thread(reason: impl Into<String>) -> Self {
        Self::OwnerThread {
            reason: reason.into(),
        }
    }

    pub fn runner_panicked(id: InvocationId, message: impl Into<String>) -> Self {
        Self::RunnerPanicked {
            id,
            message: message.into(),
        }
    }

    pub fn io(id: InvocationId, reason: impl Into<String>) -> Self {
        Self::Io {
            id,
            reason: reason.into(),
        }
    }

    /// Launch failures are never retried.
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Self::LaunchFailed { .. })
    }
}

/// Round-trip level error.
#[derive(Debug, Error)]
pub enum Error {
    /// The external invocation failed.
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// The host could not export the board description.
    #[error("Board export failed: {path}")]
    ExportFailed { path: String },

    /// The host could not import the routed session.
    #[error("Session import failed: {path}")]
    ImportFailed { path: String },

    /// Invalid input or configuration.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A registered action was not found.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        source: Box<Error>,
    },
}

impl Error {
    pub fn export_failed(path: impl Into<String>) -> Self {
        Self::ExportFailed { path: path.into() }
    }

    pub fn import_failed(path: impl Into<String>) -> Self {
        Self::ImportFailed { path: path.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Adds context to an error.
    ///
    /// # Example
    /// ```
    /// use kfr_common::{Error, Result};
    ///
    /// fn inner() -> Result<()> {
    ///     Err(Error::export_failed("board.dsn"))
    /// }
    ///
    /// fn outer() -> Result<()> {
    ///     inner().map_err(|e| e.context("Failed to prepare routing"))
    /// }
    /// ```
    pub fn context(self, message: impl Into<String>) -> Self {
        Self::WithContext {
            message: message.into(),
            source: Box::new(self),
        }
    }
}

pub trait ResultExt<T> {
    /// Adds context to an error result.
    fn context(self, message: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(message))
    }
}

//! # KFR Process Runner
//!
//! Owns one child process per invocation:
//! - spawns it on a dedicated background thread
//! - drains stdout/stderr to completion
//! - exposes a graceful-then-forced `terminate()`
//! - hands back an immutable [`ProcessInvocation`] through a bounded `join`

pub mod capture;
pub mod invocation;
pub mod runner;

pub use capture::StreamType;
pub use invocation::{InvocationOutcome, ProcessInvocation};
pub use runner::{ProcessRunner, RunnerConfig, RunnerHandle};

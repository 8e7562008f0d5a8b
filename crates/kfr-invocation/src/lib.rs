//! # KFR Invocation
//!
//! Runs an external program while the calling thread sits in a modal,
//! cancelable wait, and turns what happened into an [`InvocationReport`].
//!
//! ```no_run
//! use kfr_common::CommandLine;
//! use kfr_invocation::{InvocationManager, LifecycleConfig};
//! use kfr_progress::HeadlessSurface;
//!
//! let manager = InvocationManager::new(LifecycleConfig::default());
//! let command = CommandLine::new(["echo", "hi"]).unwrap();
//! let report = manager
//!     .invoke(command, "Running echo", &mut HeadlessSurface::new())
//!     .unwrap();
//! assert!(report.is_success());
//! ```

pub mod bridge;
pub mod manager;
pub mod report;

pub use bridge::CompletionBridge;
pub use manager::{InvocationManager, LifecycleConfig, DEFAULT_JOIN_TIMEOUT};
pub use report::InvocationReport;

//! # KFR Process
//!
//! Low-level, cross-platform process operations used by the runner:
//! - Process existence checks
//! - Graceful termination signal and force kill
//! - Executable lookup and validation

pub mod check;
pub mod terminate;
pub mod validation;

pub use check::*;
pub use terminate::*;
pub use validation::*;

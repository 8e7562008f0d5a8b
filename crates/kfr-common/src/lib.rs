//! # KFR Common
//!
//! Error taxonomy and small domain types shared by every KFR crate.

pub mod errors;
pub mod types;

pub use errors::{
    Error, InvocationError, InvocationResult, LaunchFailureKind, Result, ResultExt,
};
pub use types::{CommandLine, InvocationId};

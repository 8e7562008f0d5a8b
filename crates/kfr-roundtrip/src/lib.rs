//! # KFR Round Trip
//!
//! Drives one Freerouting pass over a board:
//! export the board as Specctra DSN through the host, patch it, run the
//! router under the modal wait, and import the resulting session.

pub mod command;
pub mod config;
pub mod dsn;
pub mod host;
pub mod plugin;
pub mod roundtrip;

pub use command::RouterCommand;
pub use config::RouterConfig;
pub use dsn::{patch_dsn, patch_dsn_file};
pub use host::{BoardHost, FileBoardHost};
pub use plugin::{ActionPlugin, FreeroutingPlugin, PluginRegistry};
pub use roundtrip::{RoundTrip, RoundTripOutcome, RoundTripPaths};

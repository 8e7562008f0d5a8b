//! Export, route, import.

use crate::command::RouterCommand;
use crate::config::RouterConfig;
use crate::dsn::patch_dsn_file;
use crate::host::BoardHost;
use kfr_common::{Error, Result, ResultExt};
use kfr_invocation::InvocationManager;
use kfr_process_runner::{InvocationOutcome, ProcessInvocation};
use kfr_progress::ProgressSurface;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Shown while the router runs.
pub const ROUTING_MESSAGE: &str =
    "Freerouting is running. Close the router window to finish, or cancel here.";

/// Scratch files of one round trip, all in the board's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTripPaths {
    /// Patched DSN handed to the router
    pub router_input: PathBuf,
    /// Raw DSN as exported by the host
    pub raw_export: PathBuf,
    /// Session written by the router
    pub router_output: PathBuf,
    /// Rules file the router may leave behind
    pub rules: PathBuf,
}

impl RoundTripPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            router_input: dir.join("freerouting.dsn"),
            raw_export: dir.join("temp-freerouting.dsn"),
            router_output: dir.join("freerouting.ses"),
            rules: dir.join("freerouting.rules"),
        }
    }

    pub fn for_board(board: &Path) -> Self {
        match board.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => Self::in_dir(dir),
            _ => Self::in_dir(Path::new(".")),
        }
    }

    fn contains(&self, path: &Path) -> bool {
        [
            &self.router_input,
            &self.raw_export,
            &self.router_output,
            &self.rules,
        ]
        .iter()
        .any(|p| p.as_path() == path)
    }
}

/// How a round trip ended without error.
#[derive(Debug, Clone)]
pub enum RoundTripOutcome {
    /// The router succeeded and its session was imported.
    Routed(ProcessInvocation),
    /// The user cancelled; nothing was imported.
    Cancelled,
}

/// One configured router round trip.
#[derive(Debug, Clone)]
pub struct RoundTrip {
    config: RouterConfig,
    manager: InvocationManager,
}

impl RoundTrip {
    pub fn new(config: RouterConfig) -> Self {
        let manager = InvocationManager::new(config.lifecycle_config());
        Self { config, manager }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Remove stale scratch files, export the board and patch it into the
    /// router input.
    pub fn prepare(&self, host: &mut dyn BoardHost, paths: &RoundTripPaths) -> Result<()> {
        let board = host.board_path();
        if paths.contains(&board) {
            return Err(Error::validation(format!(
                "Board file {} collides with a router scratch file",
                board.display()
            )));
        }

        for stale in [&paths.raw_export, &paths.router_output, &paths.rules] {
            remove_if_present(stale);
        }

        if !host.export_specctra_dsn(&paths.raw_export) || !paths.raw_export.is_file() {
            return Err(Error::export_failed(paths.raw_export.display().to_string()));
        }

        patch_dsn_file(&paths.raw_export, &paths.router_input)
    }

    /// Run the whole round trip for the host's board.
    ///
    /// On a router failure the scratch files are left in place for
    /// diagnosis.
    pub fn run(
        &self,
        host: &mut dyn BoardHost,
        surface: &mut dyn ProgressSurface,
    ) -> Result<RoundTripOutcome> {
        let paths = RoundTripPaths::for_board(&host.board_path());
        self.prepare(host, &paths)?;

        let command = RouterCommand::from_config(&self.config, &paths).to_command_line();
        let report = self.manager.invoke(command, ROUTING_MESSAGE, surface)?;

        match report.outcome() {
            InvocationOutcome::Cancelled => {
                info!("Routing cancelled, board left unchanged");
                return Ok(RoundTripOutcome::Cancelled);
            }
            outcome if !outcome.is_success() => {
                if let Some(message) = report.failure_message() {
                    warn!("{}", message);
                }
            }
            _ => {}
        }

        let invocation = match report.into_result()? {
            Some(invocation) => invocation,
            None => return Ok(RoundTripOutcome::Cancelled),
        };

        std::fs::remove_file(&paths.raw_export).context(format!(
            "Failed to remove {}",
            paths.raw_export.display()
        ))?;

        self.import(host, &paths)?;
        Ok(RoundTripOutcome::Routed(invocation))
    }

    fn import(&self, host: &mut dyn BoardHost, paths: &RoundTripPaths) -> Result<()> {
        if !paths.router_output.is_file() || !host.import_specctra_ses(&paths.router_output) {
            return Err(Error::import_failed(
                paths.router_output.display().to_string(),
            ));
        }

        std::fs::remove_file(&paths.router_input).context(format!(
            "Failed to remove {}",
            paths.router_input.display()
        ))?;
        std::fs::remove_file(&paths.router_output).context(format!(
            "Failed to remove {}",
            paths.router_output.display()
        ))?;

        info!(session = %paths.router_output.display(), "Session imported");
        Ok(())
    }
}

fn remove_if_present(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed stale file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_next_to_board() {
        let paths = RoundTripPaths::for_board(Path::new("/work/board.kicad_pcb"));
        assert_eq!(paths.router_input, PathBuf::from("/work/freerouting.dsn"));
        assert_eq!(paths.raw_export, PathBuf::from("/work/temp-freerouting.dsn"));
        assert_eq!(paths.router_output, PathBuf::from("/work/freerouting.ses"));
        assert_eq!(paths.rules, PathBuf::from("/work/freerouting.rules"));
    }

    #[test]
    fn test_bare_board_name_uses_current_dir() {
        let paths = RoundTripPaths::for_board(Path::new("board.dsn"));
        assert_eq!(paths.router_input, PathBuf::from("./freerouting.dsn"));
    }
}

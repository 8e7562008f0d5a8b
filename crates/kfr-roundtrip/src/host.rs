//! The board editor, as seen by the round trip.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Board editor operations the round trip consumes.
///
/// Export and import report success as a plain flag, the way the editor's
/// scripting API does; the round trip turns a `false` into an error.
pub trait BoardHost {
    /// Path of the open board. Scratch files go next to it.
    fn board_path(&self) -> PathBuf;

    /// Write the board as Specctra DSN to `path`.
    fn export_specctra_dsn(&mut self, path: &Path) -> bool;

    /// Apply the Specctra session at `path` to the board.
    fn import_specctra_ses(&mut self, path: &Path) -> bool;
}

/// A host backed by plain files: the "board" is an existing DSN file and
/// importing copies the session to `session_out`.
#[derive(Debug, Clone)]
pub struct FileBoardHost {
    board: PathBuf,
    session_out: PathBuf,
}

impl FileBoardHost {
    pub fn new(board: impl Into<PathBuf>, session_out: impl Into<PathBuf>) -> Self {
        Self {
            board: board.into(),
            session_out: session_out.into(),
        }
    }

    /// Session written next to the board, with a `.ses` extension.
    pub fn with_default_session(board: impl Into<PathBuf>) -> Self {
        let board = board.into();
        let session_out = board.with_extension("ses");
        Self { board, session_out }
    }

    pub fn session_out(&self) -> &Path {
        &self.session_out
    }
}

impl BoardHost for FileBoardHost {
    fn board_path(&self) -> PathBuf {
        self.board.clone()
    }

    fn export_specctra_dsn(&mut self, path: &Path) -> bool {
        match std::fs::copy(&self.board, path) {
            Ok(bytes) => {
                debug!(board = %self.board.display(), to = %path.display(), bytes, "Exported board");
                true
            }
            Err(e) => {
                warn!(board = %self.board.display(), error = %e, "Board export failed");
                false
            }
        }
    }

    fn import_specctra_ses(&mut self, path: &Path) -> bool {
        match std::fs::copy(path, &self.session_out) {
            Ok(_) => {
                debug!(session = %self.session_out.display(), "Imported session");
                true
            }
            Err(e) => {
                warn!(session = %path.display(), error = %e, "Session import failed");
                false
            }
        }
    }
}

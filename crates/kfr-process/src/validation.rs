//! Executable lookup and validation.

use kfr_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve `program` to an executable file.
///
/// A program containing a path separator is checked as-is; a bare name is
/// searched on `PATH` (honouring `PATHEXT` on Windows).
pub fn validate_executable(program: &str) -> Result<PathBuf> {
    if program.trim().is_empty() {
        return Err(Error::validation("Executable path cannot be empty"));
    }

    match which::which(program) {
        Ok(resolved) => {
            debug!(program, resolved = %resolved.display(), "Resolved executable");
            Ok(resolved)
        }
        Err(e) => Err(Error::validation(format!(
            "Executable '{}' not found or not executable: {}",
            program, e
        ))),
    }
}

/// Validate that a file (for example the router artifact) exists.
pub fn validate_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "File not found: {}",
            path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_program_rejected() {
        assert!(validate_executable("").is_err());
        assert!(validate_executable("   ").is_err());
    }

    #[test]
    fn test_missing_absolute_path() {
        let err = validate_executable("/nonexistent/binary").unwrap_err();
        assert!(err.to_string().contains("not found or not executable"));
    }

    #[test]
    fn test_unknown_bare_name() {
        let err = validate_executable("kfr-no-such-program-on-path").unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    #[cfg(unix)]
    fn test_bare_name_found_on_path() {
        let resolved = validate_executable("sh").unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("sh"));
    }

    #[test]
    #[cfg(unix)]
    fn test_script_with_path_resolved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-java");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolved = validate_executable(script.to_str().unwrap()).unwrap();
        assert_eq!(resolved, script);
    }

    #[test]
    #[cfg(unix)]
    fn test_non_executable_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("router.jar");
        std::fs::write(&file, b"not a program").unwrap();

        assert!(validate_file(&file).is_ok());
        let err = validate_executable(file.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("not executable"));
    }
}

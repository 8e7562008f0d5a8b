//! Specctra DSN patching before the router sees the file.

use kfr_common::{Result, ResultExt};
use std::path::Path;

/// Characters the router cannot parse. KiCad emits them in component
/// values (ohm and micro signs).
const STRIPPED: [char; 2] = ['\u{03A9}', '\u{00B5}'];

/// Rewrite exported DSN text into router input.
///
/// The first line is replaced by `(pcb <router_input>`; every later line
/// loses the characters in [`STRIPPED`]. Line endings are kept as they
/// are.
pub fn patch_dsn(raw: &str, router_input: &Path) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut lines = raw.split_inclusive('\n');

    if lines.next().is_some() {
        out.push_str("(pcb ");
        out.push_str(&router_input.display().to_string());
        out.push('\n');
    }

    for line in lines {
        out.extend(line.chars().filter(|c| !STRIPPED.contains(c)));
    }
    out
}

/// Patch the file at `raw_path` into `router_input`.
pub fn patch_dsn_file(raw_path: &Path, router_input: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(raw_path)
        .context(format!("Failed to read exported DSN {}", raw_path.display()))?;

    std::fs::write(router_input, patch_dsn(&raw, router_input))
        .context(format!("Failed to write router input {}", router_input.display()))?;

    tracing::debug!(
        from = %raw_path.display(),
        to = %router_input.display(),
        "Patched DSN"
    );
    Ok(())
}

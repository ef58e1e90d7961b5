use crate::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};

/// Executable names tried, in order, when no program is configured.
pub const CANDIDATES: [&str; 3] = ["pwsh", "pwsh.exe", "powershell"];

/// Locate the program that runs the extraction script.
///
/// An explicit program may be a path or a bare name looked up on `PATH`.
pub(crate) fn discover(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(program) = explicit {
        if program.is_file() {
            return Ok(program.to_path_buf());
        }
        if let Ok(path) = which::which(program) {
            return Ok(path);
        }
        tracing::info!(program = %program.display(), "Configured extraction program not found");
        exn::bail!(ErrorKind::ProgramNotFound);
    }
    for exe in CANDIDATES {
        if let Ok(path) = which::which(exe) {
            tracing::trace!(program = %path.display(), "Discovered extraction program");
            return Ok(path);
        }
    }
    tracing::info!("PowerShell executable not found in PATH");
    exn::bail!(ErrorKind::ProgramNotFound);
}

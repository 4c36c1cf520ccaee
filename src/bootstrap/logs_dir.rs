use crate::error::{HaikuError, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Create the log directory if needed and check that it is writable.
///
/// Safe to call repeatedly. Any failure is fatal for startup: the caller
/// must not launch the service when this returns an error.
pub fn provision_logs_dir(path: &Path) -> Result<PathBuf> {
    if path.exists() && !path.is_dir() {
        return Err(HaikuError::LogDirError(format!(
            "{} exists and is not a directory",
            path.display()
        )));
    }

    fs::create_dir_all(path).map_err(|e| {
        HaikuError::LogDirError(format!("Failed to create {}: {}", path.display(), e))
    })?;

    check_writable(path)?;

    tracing::debug!("Log directory ready at {}", path.display());
    Ok(path.to_path_buf())
}

/// Whether `provision_logs_dir` would succeed, without creating anything
pub fn check_logs_dir(path: &Path) -> Result<()> {
    if path.is_dir() {
        return check_writable(path);
    }
    if path.exists() {
        return Err(HaikuError::LogDirError(format!(
            "{} exists and is not a directory",
            path.display()
        )));
    }

    let parent = path
        .ancestors()
        .skip(1)
        .find(|ancestor| ancestor.exists())
        .ok_or_else(|| {
            HaikuError::LogDirError(format!("{} has no existing parent", path.display()))
        })?;
    if !parent.is_dir() {
        return Err(HaikuError::LogDirError(format!(
            "{} cannot be created under {}",
            path.display(),
            parent.display()
        )));
    }
    check_writable(parent)
}

/// Probe writability by creating and removing a scratch file
fn check_writable(dir: &Path) -> Result<()> {
    let probe = dir.join(format!(".write-probe-{}", std::process::id()));

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&probe)
        .map_err(|e| {
            HaikuError::LogDirError(format!("{} is not writable: {}", dir.display(), e))
        })?;

    fs::remove_file(&probe).map_err(|e| {
        HaikuError::LogDirError(format!(
            "Failed to remove probe file {}: {}",
            probe.display(),
            e
        ))
    })?;

    Ok(())
}

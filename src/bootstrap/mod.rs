// Bootstrap module - brings the service into a runnable state

mod environment;
mod identity;
mod logs_dir;
pub mod manifest;

pub use environment::{RuntimeEnv, MODULE_PATH_VAR, UNBUFFERED_VAR};
pub use identity::{drop_privileges, ensure_not_root, ensure_ownership, is_root, ServiceIdentity};
pub use logs_dir::{check_logs_dir, provision_logs_dir};
pub use manifest::{InstalledPackages, Manifest, Requirement};

use crate::config::ServiceConfig;
use crate::error::{HaikuError, Result};
use std::path::PathBuf;

/// Outcome of the dependency manifest check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestStatus {
    /// No manifest file present
    Missing,
    /// Manifest parsed, no package directory configured to resolve against
    Parsed(usize),
    /// Every requirement resolved
    Resolved(usize),
}

/// What `prepare` did
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub manifest: ManifestStatus,
    pub logs_dir: PathBuf,
    pub identity: ServiceIdentity,
    pub ownership_changes: usize,
}

/// Check the dependency manifest before anything is started
pub fn preflight(config: &ServiceConfig) -> Result<ManifestStatus> {
    let path = config.manifest_path();
    if !path.exists() {
        tracing::info!("No manifest at {}, skipping dependency check", path.display());
        return Ok(ManifestStatus::Missing);
    }

    let manifest = Manifest::from_file(&path)?;

    let Some(ref site) = config.manifest.site_packages else {
        tracing::info!(
            "Parsed {} requirements from {}",
            manifest.len(),
            path.display()
        );
        return Ok(ManifestStatus::Parsed(manifest.len()));
    };

    let installed = InstalledPackages::scan(site)?;
    let resolved = manifest.resolve(&installed)?;
    for (name, version) in &resolved {
        tracing::debug!("Resolved {} {}", name, version);
    }
    tracing::info!(
        "Resolved {} requirements against {}",
        resolved.len(),
        site.display()
    );

    Ok(ManifestStatus::Resolved(resolved.len()))
}

/// Run every startup step that must precede the service process.
///
/// Order: manifest preflight, working directory check, log directory,
/// ownership of the working tree. The first failure aborts.
pub fn prepare(config: &ServiceConfig) -> Result<BootstrapReport> {
    let manifest = preflight(config)?;

    if !config.workdir.is_dir() {
        return Err(HaikuError::ConfigValidationError(format!(
            "Working directory does not exist: {}",
            config.workdir.display()
        )));
    }

    let logs_dir = provision_logs_dir(&config.logs_path())?;

    let identity = ServiceIdentity::from(&config.identity);
    let ownership_changes = ensure_ownership(&config.workdir, identity)?;

    Ok(BootstrapReport {
        manifest,
        logs_dir,
        identity,
        ownership_changes,
    })
}

/// Switch to the service account and refuse to continue as root
pub fn enter_service_identity(identity: ServiceIdentity) -> Result<bool> {
    let dropped = drop_privileges(identity)?;
    ensure_not_root()?;
    Ok(dropped)
}

// Service account handling: ownership of the working tree and privilege drop

use crate::config::IdentityConfig;
use crate::error::{HaikuError, Result};
use std::fmt;
use std::path::Path;

/// Numeric uid/gid the service runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceIdentity {
    pub uid: u32,
    pub gid: u32,
}

impl ServiceIdentity {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// Identity of the calling process (effective ids)
    #[cfg(unix)]
    pub fn current() -> Self {
        use nix::unistd::{Gid, Uid};

        Self {
            uid: Uid::effective().as_raw(),
            gid: Gid::effective().as_raw(),
        }
    }
}

impl From<&IdentityConfig> for ServiceIdentity {
    fn from(config: &IdentityConfig) -> Self {
        Self::new(config.uid, config.gid)
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid={} gid={}", self.uid, self.gid)
    }
}

/// Whether the process currently holds root privileges
#[cfg(unix)]
pub fn is_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

/// Fail if the process runs with root privileges
pub fn ensure_not_root() -> Result<()> {
    if is_root() {
        return Err(HaikuError::PermissionDenied(
            "refusing to run the service as root".to_string(),
        ));
    }
    Ok(())
}

/// Make every entry under `root` owned by `identity`.
///
/// Returns the number of entries whose ownership changed. Without root
/// privileges nothing can be changed, so any entry with a different owner
/// is reported as an error instead. Symlinks are left alone.
#[cfg(unix)]
pub fn ensure_ownership(root: &Path, identity: ServiceIdentity) -> Result<usize> {
    use nix::unistd::{chown, Gid, Uid};
    use std::os::unix::fs::MetadataExt;
    use walkdir::WalkDir;

    let privileged = is_root();
    let mut changed = 0;

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            HaikuError::OwnershipError(root.display().to_string(), e.to_string())
        })?;
        if entry.path_is_symlink() {
            continue;
        }

        let path = entry.path();
        let metadata = entry.metadata().map_err(|e| {
            HaikuError::OwnershipError(path.display().to_string(), e.to_string())
        })?;

        if metadata.uid() == identity.uid && metadata.gid() == identity.gid {
            continue;
        }

        if !privileged {
            return Err(HaikuError::OwnershipError(
                path.display().to_string(),
                format!(
                    "owned by uid={} gid={}, expected {} and not running as root",
                    metadata.uid(),
                    metadata.gid(),
                    identity
                ),
            ));
        }

        chown(
            path,
            Some(Uid::from_raw(identity.uid)),
            Some(Gid::from_raw(identity.gid)),
        )
        .map_err(|e| HaikuError::OwnershipError(path.display().to_string(), e.to_string()))?;
        changed += 1;
    }

    if changed > 0 {
        tracing::info!(
            "Changed ownership of {} entries under {} to {}",
            changed,
            root.display(),
            identity
        );
    }

    Ok(changed)
}

#[cfg(not(unix))]
pub fn ensure_ownership(_root: &Path, _identity: ServiceIdentity) -> Result<usize> {
    Err(HaikuError::Other(
        "Ownership management is only supported on Unix systems".to_string(),
    ))
}

/// Switch the process to `identity` if it runs as root.
///
/// Returns `true` when privileges were dropped, `false` when the process
/// was already unprivileged.
#[cfg(unix)]
pub fn drop_privileges(identity: ServiceIdentity) -> Result<bool> {
    use nix::unistd::{setgid, setuid, Gid, Uid};

    if identity.uid == 0 {
        return Err(HaikuError::PrivilegeError(
            "target identity is root".to_string(),
        ));
    }

    if !is_root() {
        return Ok(false);
    }

    let gid = Gid::from_raw(identity.gid);

    // Supplementary groups go first, while we still may change them
    #[cfg(not(target_os = "macos"))]
    nix::unistd::setgroups(&[gid])
        .map_err(|e| HaikuError::PrivilegeError(format!("setgroups failed: {}", e)))?;

    setgid(gid).map_err(|e| HaikuError::PrivilegeError(format!("setgid failed: {}", e)))?;
    setuid(Uid::from_raw(identity.uid))
        .map_err(|e| HaikuError::PrivilegeError(format!("setuid failed: {}", e)))?;

    if Uid::current().is_root() || Uid::effective().is_root() {
        return Err(HaikuError::PrivilegeError(
            "still running as root after setuid".to_string(),
        ));
    }

    tracing::info!("Dropped privileges to {}", identity);
    Ok(true)
}

#[cfg(not(unix))]
pub fn drop_privileges(_identity: ServiceIdentity) -> Result<bool> {
    Ok(false)
}

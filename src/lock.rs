use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::LockError;

/// Single-instance guard: a file holding the owner's pid, created exclusively
/// and removed on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        match Self::create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let pid = fs::read_to_string(&path).unwrap_or_default().trim().to_string();
                if owner_is_gone(&pid) {
                    warn!("Removing stale lock {} (pid {})", path.display(), pid);
                    fs::remove_file(&path)?;
                    return Ok(Self::create(&path)?);
                }
                Err(LockError::Held {
                    path: path.display().to_string(),
                    pid,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        write!(file, "{}", std::process::id())?;
        info!("Instance lock acquired: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(target_os = "linux")]
fn owner_is_gone(pid: &str) -> bool {
    match pid.parse::<u32>() {
        Ok(pid) => !Path::new(&format!("/proc/{pid}")).exists(),
        Err(_) => false,
    }
}

#[cfg(not(target_os = "linux"))]
fn owner_is_gone(_pid: &str) -> bool {
    false
}
